//! HTTP error surface: every failure becomes `{"error": {"code", "message"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::analysis::AnalysisError;
use crate::db::DatabaseError;
use crate::knowledge::KnowledgeError;
use crate::llm::LlmError;
use crate::transcript::TranscriptError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL",
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "UPSTREAM",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "Request failed");
        } else {
            tracing::debug!(code = self.code, message = %self.message, "Request rejected");
        }
        let body = Json(json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

impl From<TranscriptError> for ApiError {
    fn from(e: TranscriptError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { .. } => Self::not_found(e.to_string()),
            _ => Self::internal(e.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        Self::upstream(e.to_string())
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(e: KnowledgeError) -> Self {
        match e {
            KnowledgeError::EmptyContent | KnowledgeError::Unparseable(_) => {
                Self::bad_request(e.to_string())
            }
            KnowledgeError::Fetch(_) | KnowledgeError::Embedding(_) => {
                Self::upstream(e.to_string())
            }
            KnowledgeError::Database(db) => db.into(),
            KnowledgeError::LockPoisoned => Self::internal(e.to_string()),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Upstream(_) => Self::upstream(e.to_string()),
            AnalysisError::Schema(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                code: "SCHEMA_INVALID",
                message: e.to_string(),
            },
            AnalysisError::Incomplete { .. } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "ANALYSIS_INCOMPLETE",
                message: e.to_string(),
            },
            AnalysisError::Database(db) => db.into(),
            AnalysisError::LockPoisoned => Self::internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_codes() {
        let e: ApiError = AnalysisError::Schema("bad scores".into()).into();
        assert_eq!(e.code, "SCHEMA_INVALID");
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);

        let e: ApiError = AnalysisError::Incomplete {
            attempts: 3,
            reason: "never accepted".into(),
        }
        .into();
        assert_eq!(e.code, "ANALYSIS_INCOMPLETE");
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_database_errors_are_404() {
        let e: ApiError = DatabaseError::NotFound {
            entity_type: "faq_document".into(),
            id: "abc".into(),
        }
        .into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn transcript_errors_are_400() {
        let e: ApiError = TranscriptError::Empty.into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "BAD_REQUEST");
    }
}
