//! The analysis state machine.
//!
//! One run walks Rewriting -> Retrieving -> Generating -> Verifying, with a
//! bounded back-edge from Verifying to Generating when the verifier rejects
//! a draft. Retrieval happens once per run; regenerations reuse the same
//! references. Only terminal results touch the database, in one transaction.

use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::types::{GraphState, Verdict, WorkflowState};
use super::{generate, rewrite, verify, AnalysisError};
use crate::config::{ExhaustionPolicy, Settings};
use crate::knowledge::embedding::Embedder;
use crate::knowledge::retriever;
use crate::llm::ChatModel;
use crate::models::{AnalysisResult, Conversation};

pub struct AnalysisWorkflow<C, E> {
    chat: C,
    embedder: E,
    retrieval_top_k: usize,
    retrieval_min_score: f32,
    max_regenerations: u32,
    exhaustion_policy: ExhaustionPolicy,
    generation_gate: Semaphore,
}

impl<C: ChatModel, E: Embedder> AnalysisWorkflow<C, E> {
    pub fn new(settings: &Settings, chat: C, embedder: E) -> Self {
        Self {
            chat,
            embedder,
            retrieval_top_k: settings.retrieval_top_k,
            retrieval_min_score: settings.retrieval_min_score,
            max_regenerations: settings.max_regenerations,
            exhaustion_policy: settings.exhaustion_policy,
            generation_gate: Semaphore::new(settings.generation_concurrency.max(1)),
        }
    }

    /// Run one analysis to a terminal state and persist the result.
    pub async fn analyze(
        &self,
        conn: &Mutex<Connection>,
        conversation: Conversation,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let mut state = GraphState::new(conversation);
        let mut step = WorkflowState::Rewriting;
        // Set only when the run ends Accepted.
        let mut verified = false;

        loop {
            match step {
                WorkflowState::Rewriting => {
                    state.rewritten_query =
                        Some(rewrite::rewrite_query(&self.chat, &state.conversation).await);
                    step = WorkflowState::Retrieving;
                }
                WorkflowState::Retrieving => {
                    // A broken knowledge store degrades to ungrounded
                    // analysis rather than failing the request.
                    state.references = match retriever::retrieve(
                        conn,
                        &self.embedder,
                        state.retrieval_query(),
                        self.retrieval_top_k,
                        self.retrieval_min_score,
                    )
                    .await
                    {
                        Ok(references) => references,
                        Err(e) => {
                            tracing::warn!(request_id = %request_id, error = %e,
                                "Retrieval failed, analyzing without references");
                            Vec::new()
                        }
                    };
                    step = WorkflowState::Generating;
                }
                WorkflowState::Generating => {
                    if state.attempts > self.max_regenerations {
                        step = WorkflowState::Failed;
                        continue;
                    }
                    state.attempts += 1;

                    let _permit = self
                        .generation_gate
                        .acquire()
                        .await
                        .map_err(|_| AnalysisError::LockPoisoned)?;
                    match generate::generate_draft(
                        &self.chat,
                        &state.conversation,
                        &state.references,
                    )
                    .await
                    {
                        Ok(draft) => {
                            state.draft = Some(draft);
                            step = WorkflowState::Verifying;
                        }
                        // Schema violations share the regeneration budget
                        // with verifier rejections.
                        Err(AnalysisError::Schema(reason)) => {
                            tracing::warn!(request_id = %request_id, attempt = state.attempts,
                                %reason, "Draft violates output contract");
                            step = WorkflowState::Generating;
                        }
                        Err(e) => return Err(e),
                    }
                }
                WorkflowState::Verifying => {
                    let draft = state
                        .draft
                        .as_ref()
                        .ok_or_else(|| AnalysisError::Schema("no draft to verify".into()))?;
                    match verify::verify_draft(draft, &state.references) {
                        Verdict::Accepted => {
                            verified = true;
                            step = WorkflowState::Accepted;
                        }
                        Verdict::Regenerate { reason } => {
                            tracing::warn!(request_id = %request_id, attempt = state.attempts,
                                %reason, "Verifier rejected draft");
                            state.keep_best_rejected();
                            step = WorkflowState::Generating;
                        }
                    }
                }
                WorkflowState::Accepted => break,
                WorkflowState::Failed => match self.exhaustion_policy {
                    ExhaustionPolicy::BestEffort if state.best_rejected.is_some() => {
                        tracing::warn!(request_id = %request_id, attempts = state.attempts,
                            "Regeneration budget exhausted, returning best unverified draft");
                        break;
                    }
                    _ => {
                        return Err(AnalysisError::Incomplete {
                            attempts: state.attempts,
                            reason: "no draft passed verification".into(),
                        });
                    }
                },
            }
        }

        // Accepted runs carry the verified draft; exhausted best-effort
        // runs fall back to the highest-scoring rejected one.
        let draft = if verified {
            state.draft.take()
        } else {
            state.best_rejected.take()
        }
        .ok_or_else(|| AnalysisError::Schema("terminal state without draft".into()))?;
        let mut conversation = state.conversation;
        if conversation.id.is_none() {
            conversation.id = Some(Uuid::new_v4());
        }

        let result = AnalysisResult {
            request_id,
            conversation_id: conversation.id,
            analyzed_at: Utc::now(),
            total_score: draft.scores.total_score(),
            scores: draft.scores,
            strengths: draft.strengths,
            improvements: draft.improvements,
            overall_feedback: draft.overall_feedback,
            is_resolved: None,
            csat_score: None,
            is_verified: verified,
            analysis_ms: started.elapsed().as_millis() as u64,
        };

        {
            let mut guard = conn.lock().map_err(|_| AnalysisError::LockPoisoned)?;
            crate::db::repository::persist_result(&mut guard, &conversation, &result)?;
        }

        tracing::info!(
            request_id = %request_id,
            total_score = result.total_score,
            attempts = state.attempts,
            verified,
            elapsed_ms = result.analysis_ms,
            "Analysis complete"
        );
        Ok(result)
    }
}
