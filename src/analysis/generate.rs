//! Draft generation: one model call producing a structured assessment.

use std::time::Duration;

use super::prompt;
use super::types::{DraftResult, LlmAnalysisResponse};
use super::AnalysisError;
use crate::llm::{call_with_backoff, ChatModel};
use crate::models::{Conversation, Reference};

const BACKOFF_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Ask the model for one assessment draft. Transient backend failures are
/// retried with backoff; a reply that violates the output contract is a
/// `Schema` error, which counts against the regeneration budget upstream.
pub async fn generate_draft<C: ChatModel>(
    chat: &C,
    conversation: &Conversation,
    references: &[Reference],
) -> Result<DraftResult, AnalysisError> {
    let user = prompt::generate_user_prompt(conversation, references);
    let raw = call_with_backoff(
        || chat.complete(prompt::GENERATE_SYSTEM, &user),
        BACKOFF_ATTEMPTS,
        BACKOFF_BASE,
    )
    .await?;

    parse_draft(&raw)
}

pub fn parse_draft(raw: &str) -> Result<DraftResult, AnalysisError> {
    let body = strip_code_fences(raw);
    let parsed: LlmAnalysisResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::Schema(format!("invalid JSON: {e}")))?;

    let scores: crate::models::Scores = parsed.scores.into();
    if !scores.in_range() {
        return Err(AnalysisError::Schema(format!(
            "scores out of 1..=10 range: {:?}",
            scores.as_array()
        )));
    }
    if parsed.overall_feedback.trim().is_empty() {
        return Err(AnalysisError::Schema("overall_feedback is empty".into()));
    }

    Ok(DraftResult {
        scores,
        strengths: parsed.strengths,
        improvements: parsed.improvements.into_iter().map(Into::into).collect(),
        overall_feedback: parsed.overall_feedback,
    })
}

/// Models sometimes wrap JSON in markdown fences despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
