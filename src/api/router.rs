//! HTTP surface: analysis, history, KPI and FAQ management routes.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use rusqlite::Connection;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::error::ApiError;
use super::types::{
    AnalyzeResponse, AnalyzeTextRequest, DeletedResponse, FaqStatusRequest, FaqTextRequest,
    FaqUpdateRequest, FaqUrlRequest, FeedbackRequest, HistoryDetailResponse, HistoryListResponse,
    HistoryQuery, IngestResponse,
};
use crate::analysis::AnalysisWorkflow;
use crate::config::Settings;
use crate::db::knowledge::{self as faq_store, DocumentListItem};
use crate::db::repository::{self, SortBy};
use crate::knowledge::chunker::TextChunker;
use crate::knowledge::ingest::{self, IngestSource};
use crate::llm::{OpenAiChat, OpenAiEmbedder, OpenAiTranscriber, Transcriber};
use crate::models::DashboardStats;
use crate::transcript;

const MAX_HISTORY_LIMIT: usize = 500;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "mp4", "webm", "ogg", "flac"];

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub workflow: Arc<AnalysisWorkflow<OpenAiChat, OpenAiEmbedder>>,
    pub embedder: OpenAiEmbedder,
    pub transcriber: OpenAiTranscriber,
    pub chunker: Arc<TextChunker>,
}

impl AppState {
    pub fn new(settings: &Settings, conn: Connection) -> Self {
        let chat = OpenAiChat::new(settings);
        let embedder = OpenAiEmbedder::new(settings);
        Self {
            db: Arc::new(Mutex::new(conn)),
            workflow: Arc::new(AnalysisWorkflow::new(settings, chat, embedder.clone())),
            embedder,
            transcriber: OpenAiTranscriber::new(settings),
            chunker: Arc::new(TextChunker::new(settings.chunk_size, settings.chunk_overlap)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned"))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze/text", post(analyze_text))
        .route("/api/analyze/file", post(analyze_file))
        .route("/api/history", get(list_history))
        .route("/api/history/:request_id", get(get_history))
        .route("/api/history/:request_id", delete(delete_history))
        .route("/api/history/:request_id/feedback", patch(update_feedback))
        .route("/api/home/stats", get(home_stats))
        .route("/api/faq/file", post(ingest_faq_file))
        .route("/api/faq/url", post(ingest_faq_url))
        .route("/api/faq/text", post(ingest_faq_text))
        .route("/api/faq/list", get(list_faq))
        .route("/api/faq/:document_id", get(get_faq))
        .route("/api/faq/:document_id/status", patch(set_faq_status))
        .route("/api/faq/:document_id", patch(update_faq))
        .route("/api/faq/:document_id", delete(delete_faq))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::config::APP_VERSION,
    }))
}

async fn analyze_text(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeTextRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let conversation = transcript::parse(&body.transcript)?;
    let result = state.workflow.analyze(&state.db, conversation).await?;
    Ok(Json(result.into()))
}

/// Analyze an uploaded file. Audio files are transcribed first; anything
/// else is treated as a plain-text transcript.
async fn analyze_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;

    let raw = if is_audio(&filename) {
        state.transcriber.transcribe(bytes, &filename).await?
    } else {
        String::from_utf8(bytes)
            .map_err(|_| ApiError::bad_request("Transcript file is not valid UTF-8"))?
    };

    let conversation = transcript::parse(&raw)?;
    let result = state.workflow.analyze(&state.db, conversation).await?;
    Ok(Json(result.into()))
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryListResponse>, ApiError> {
    let sort = SortBy::parse(query.sort.as_deref().unwrap_or("date"));
    let limit = query.limit.clamp(1, MAX_HISTORY_LIMIT);
    let guard = state.lock()?;
    let items = repository::list_analyses(&guard, limit, sort)?;
    let count = items.len();
    Ok(Json(HistoryListResponse { items, count }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<HistoryDetailResponse>, ApiError> {
    let guard = state.lock()?;
    let result = repository::get_analysis(&guard, &request_id)?
        .ok_or_else(|| ApiError::not_found(format!("No analysis for request {request_id}")))?;
    let conversation_data = match result.conversation_id {
        Some(id) => repository::get_conversation(&guard, &id)?,
        None => None,
    };
    Ok(Json(HistoryDetailResponse {
        result,
        conversation_data,
    }))
}

async fn delete_history(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let guard = state.lock()?;
    if repository::delete_analysis(&guard, &request_id)? {
        Ok(Json(DeletedResponse { deleted: true }))
    } else {
        Err(ApiError::not_found(format!(
            "No analysis for request {request_id}"
        )))
    }
}

async fn update_feedback(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<FeedbackRequest>,
) -> Result<StatusCode, ApiError> {
    if body.is_resolved.is_none() && body.csat_score.is_none() {
        return Err(ApiError::bad_request("No feedback fields provided"));
    }
    if let Some(csat) = body.csat_score {
        if !(1..=5).contains(&csat) {
            return Err(ApiError::bad_request("csat_score must be between 1 and 5"));
        }
    }

    let guard = state.lock()?;
    if repository::update_feedback(&guard, &request_id, body.is_resolved, body.csat_score)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "No analysis for request {request_id}"
        )))
    }
}

async fn home_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let guard = state.lock()?;
    Ok(Json(repository::dashboard_stats(&guard)?))
}

async fn ingest_faq_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;
    let source = IngestSource::File { filename, bytes };
    run_ingest(&state, source).await
}

async fn ingest_faq_url(
    State(state): State<AppState>,
    Json(body): Json<FaqUrlRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }
    run_ingest(&state, IngestSource::Url(body.url)).await
}

async fn ingest_faq_text(
    State(state): State<AppState>,
    Json(body): Json<FaqTextRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    let source = IngestSource::Text {
        name: body.name,
        content: body.content,
    };
    run_ingest(&state, source).await
}

async fn run_ingest(
    state: &AppState,
    source: IngestSource,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let (document, chunk_count) =
        ingest::ingest(&state.db, &state.embedder, &state.chunker, source).await?;
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            document_id: document.id,
            name: document.name,
            chunk_count,
        }),
    ))
}

async fn list_faq(State(state): State<AppState>) -> Result<Json<Vec<DocumentListItem>>, ApiError> {
    let guard = state.lock()?;
    Ok(Json(faq_store::list_documents(&guard, true)?))
}

async fn get_faq(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentListItem>, ApiError> {
    let guard = state.lock()?;
    let document = faq_store::get_document(&guard, &document_id)?
        .ok_or_else(|| ApiError::not_found(format!("No FAQ document {document_id}")))?;
    let chunk_count = faq_store::count_chunks(&guard, &document_id)?;
    Ok(Json(DocumentListItem {
        document,
        chunk_count,
    }))
}

async fn set_faq_status(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(body): Json<FaqStatusRequest>,
) -> Result<StatusCode, ApiError> {
    let guard = state.lock()?;
    if faq_store::set_document_active(&guard, &document_id, body.is_active)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "No FAQ document {document_id}"
        )))
    }
}

async fn update_faq(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(body): Json<FaqUpdateRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let chunk_count = ingest::update(
        &state.db,
        &state.embedder,
        &state.chunker,
        &document_id,
        &body.content,
    )
    .await?;

    let guard = state.lock()?;
    let document = faq_store::get_document(&guard, &document_id)?
        .ok_or_else(|| ApiError::not_found(format!("No FAQ document {document_id}")))?;
    Ok(Json(IngestResponse {
        document_id,
        name: document.name,
        chunk_count,
    }))
}

async fn delete_faq(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let guard = state.lock()?;
    if faq_store::delete_document(&guard, &document_id)? {
        Ok(Json(DeletedResponse { deleted: true }))
    } else {
        Err(ApiError::not_found(format!(
            "No FAQ document {document_id}"
        )))
    }
}

fn is_audio(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pull the uploaded file out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ApiError::bad_request("Missing file field"))
}
