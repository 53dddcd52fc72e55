//! Conversation quality analysis: rewrite, retrieve, generate, verify.
//!
//! The workflow is a small state machine. Each analysis request rewrites a
//! retrieval query, pulls grounding references from the FAQ store, asks the
//! model for a structured assessment, and gates the draft through a
//! deterministic verifier before anything is persisted.

pub mod generate;
pub mod prompt;
pub mod rewrite;
pub mod types;
pub mod verify;
pub mod workflow;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::llm::LlmError;

pub use types::{DraftResult, GraphState, Verdict, WorkflowState};
pub use workflow::AnalysisWorkflow;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The model backend failed after retries.
    #[error("Model backend unavailable: {0}")]
    Upstream(#[from] LlmError),

    /// The model replied but the reply does not satisfy the output contract.
    #[error("Model output violates the analysis schema: {0}")]
    Schema(String),

    /// The regeneration budget ran out without an accepted draft and the
    /// policy forbids returning a degraded result.
    #[error("Analysis could not be completed within {attempts} attempts: {reason}")]
    Incomplete { attempts: u32, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Analysis store lock poisoned")]
    LockPoisoned,
}
