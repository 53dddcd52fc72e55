pub mod chunker;
pub mod embedding;
pub mod ingest;
pub mod retriever;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Document content is empty")]
    EmptyContent,

    #[error("Cannot parse document content: {0}")]
    Unparseable(String),

    #[error("Failed to fetch URL: {0}")]
    Fetch(String),

    #[error("Embedding service error: {0}")]
    Embedding(#[from] LlmError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Knowledge store lock poisoned")]
    LockPoisoned,
}
