//! FAQ ingestion: extract text, chunk, embed, then commit atomically.
//!
//! Embeddings are computed before the database transaction opens, so an
//! embedding-service outage leaves prior state untouched and a crash can
//! never leave a document with a partial chunk set.

use std::sync::Mutex;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::Connection;
use uuid::Uuid;

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::KnowledgeError;
use crate::db::knowledge as store;
use crate::models::{FaqDocument, SourceType};

/// Where ingested content comes from.
pub enum IngestSource {
    File { filename: String, bytes: Vec<u8> },
    Url(String),
    Text { name: String, content: String },
}

impl IngestSource {
    fn source_type(&self) -> SourceType {
        match self {
            Self::File { .. } => SourceType::File,
            Self::Url(_) => SourceType::Url,
            Self::Text { .. } => SourceType::Text,
        }
    }
}

/// Ingest a document: one new `FaqDocument` plus all its embedded chunks.
/// Returns the stored document and the number of chunks created.
pub async fn ingest<E: Embedder>(
    conn: &Mutex<Connection>,
    embedder: &E,
    chunker: &TextChunker,
    source: IngestSource,
) -> Result<(FaqDocument, usize), KnowledgeError> {
    let source_type = source.source_type();
    let (name, url, text) = extract_text(source).await?;

    let chunks = chunk_non_empty(chunker, &text)?;
    let embeddings = embed_chunks(embedder, &chunks).await?;

    let document = FaqDocument {
        id: Uuid::new_v4(),
        name,
        source_type,
        url,
        is_active: true,
        created_at: Utc::now(),
    };

    let mut guard = conn.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
    let stored = store::insert_document_with_chunks(&mut guard, &document, &chunks, &embeddings)?;

    Ok((document, stored))
}

/// Re-ingest new content for an existing document, preserving its id.
/// Returns the new chunk count.
pub async fn update<E: Embedder>(
    conn: &Mutex<Connection>,
    embedder: &E,
    chunker: &TextChunker,
    document_id: &Uuid,
    new_content: &str,
) -> Result<usize, KnowledgeError> {
    let chunks = chunk_non_empty(chunker, new_content)?;
    let embeddings = embed_chunks(embedder, &chunks).await?;

    let mut guard = conn.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
    let stored = store::replace_document_chunks(&mut guard, document_id, &chunks, &embeddings)?;
    Ok(stored)
}

fn chunk_non_empty(chunker: &TextChunker, text: &str) -> Result<Vec<String>, KnowledgeError> {
    if text.trim().is_empty() {
        return Err(KnowledgeError::EmptyContent);
    }
    let chunks = chunker.chunk(text);
    if chunks.is_empty() {
        return Err(KnowledgeError::EmptyContent);
    }
    Ok(chunks)
}

async fn embed_chunks<E: Embedder>(
    embedder: &E,
    chunks: &[String],
) -> Result<Vec<Vec<f32>>, KnowledgeError> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
    Ok(embedder.embed_batch(&texts).await?)
}

async fn extract_text(
    source: IngestSource,
) -> Result<(String, Option<String>, String), KnowledgeError> {
    match source {
        IngestSource::File { filename, bytes } => {
            let text = String::from_utf8(bytes)
                .map_err(|_| KnowledgeError::Unparseable("file is not valid UTF-8".into()))?;
            Ok((filename, None, text))
        }
        IngestSource::Url(url) => {
            let html = fetch_url(&url).await?;
            let text = strip_html(&html);
            Ok((url.clone(), Some(url), text))
        }
        IngestSource::Text { name, content } => Ok((name, None, content)),
    }
}

async fn fetch_url(url: &str) -> Result<String, KnowledgeError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| KnowledgeError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(KnowledgeError::Fetch(format!(
            "HTTP {} from {url}",
            response.status()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| KnowledgeError::Fetch(e.to_string()))
}

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap()
});
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip HTML down to readable text: drop script/style, remove tags,
/// decode the common entities, collapse blank-line runs.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, "");
    let text = TAGS.replace_all(&text, "\n");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text: String = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&text, "\n\n").trim().to_string()
}
