//! State carried through one analysis run.

use serde::Deserialize;

use crate::models::{Conversation, Improvement, Priority, Reference, Scores};

/// Where a run currently sits in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Rewriting,
    Retrieving,
    Generating,
    Verifying,
    Accepted,
    Failed,
}

/// Request-scoped state threaded through the workflow steps. Created fresh
/// per request; nothing here is shared between runs.
pub struct GraphState {
    pub conversation: Conversation,
    /// Raw retrieval query before rewriting (concatenated customer turns).
    pub user_query: String,
    pub rewritten_query: Option<String>,
    pub references: Vec<Reference>,
    pub draft: Option<DraftResult>,
    /// Highest-scoring draft the verifier rejected, kept for the
    /// degraded-result path when the regeneration budget runs out.
    pub best_rejected: Option<DraftResult>,
    /// Generation attempts consumed so far, including the first draft.
    pub attempts: u32,
}

impl GraphState {
    pub fn new(conversation: Conversation) -> Self {
        let user_query = conversation.customer_text();
        Self {
            conversation,
            user_query,
            rewritten_query: None,
            references: Vec::new(),
            draft: None,
            best_rejected: None,
            attempts: 0,
        }
    }

    /// The query retrieval actually runs with.
    pub fn retrieval_query(&self) -> &str {
        self.rewritten_query.as_deref().unwrap_or(&self.user_query)
    }

    /// Move the current draft into the degraded-result slot, keeping
    /// whichever rejected draft has the higher total score.
    pub fn keep_best_rejected(&mut self) {
        if let Some(draft) = self.draft.take() {
            let better = self
                .best_rejected
                .as_ref()
                .map_or(true, |best| {
                    draft.scores.total_score() > best.scores.total_score()
                });
            if better {
                self.best_rejected = Some(draft);
            }
        }
    }
}

/// One generated assessment, pre-verification.
#[derive(Debug, Clone)]
pub struct DraftResult {
    pub scores: Scores,
    pub strengths: Vec<String>,
    pub improvements: Vec<Improvement>,
    pub overall_feedback: String,
}

/// Verifier outcome for a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Regenerate { reason: String },
}

/// Wire shape of the model's JSON reply.
#[derive(Debug, Deserialize)]
pub struct LlmAnalysisResponse {
    pub scores: LlmScores,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<LlmImprovement>,
    pub overall_feedback: String,
}

/// Scores as the model reports them; range-checked before use.
#[derive(Debug, Deserialize)]
pub struct LlmScores {
    pub clarification: u8,
    pub empathy_tone: u8,
    pub solution_accuracy: u8,
    pub actionability: u8,
    pub confirmation_closure: u8,
    pub compliance_safety: u8,
}

impl From<LlmScores> for Scores {
    fn from(s: LlmScores) -> Self {
        Scores {
            clarification: s.clarification,
            empathy_tone: s.empathy_tone,
            solution_accuracy: s.solution_accuracy,
            actionability: s.actionability,
            confirmation_closure: s.confirmation_closure,
            compliance_safety: s.compliance_safety,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmImprovement {
    pub issue: String,
    #[serde(default)]
    pub original: String,
    pub suggested: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Important
}

impl From<LlmImprovement> for Improvement {
    fn from(i: LlmImprovement) -> Self {
        Improvement {
            issue: i.issue,
            original: i.original,
            suggested: i.suggested,
            reason: i.reason,
            priority: i.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Speaker, Turn};

    #[test]
    fn fresh_state_uses_customer_text_as_query() {
        let conversation = Conversation::new(vec![
            Turn {
                speaker: Speaker::Customer,
                message: "Where is my refund?".into(),
                timestamp: None,
            },
            Turn {
                speaker: Speaker::Agent,
                message: "Let me check.".into(),
                timestamp: None,
            },
        ]);
        let state = GraphState::new(conversation);
        assert_eq!(state.retrieval_query(), "Where is my refund?");
        assert_eq!(state.attempts, 0);
        assert!(state.references.is_empty());
        assert!(state.best_rejected.is_none());
    }

    fn draft_with_total(per_dim: u8) -> DraftResult {
        DraftResult {
            scores: crate::models::Scores {
                clarification: per_dim,
                empathy_tone: per_dim,
                solution_accuracy: per_dim,
                actionability: per_dim,
                confirmation_closure: per_dim,
                compliance_safety: per_dim,
            },
            strengths: vec![],
            improvements: vec![],
            overall_feedback: "feedback".into(),
        }
    }

    #[test]
    fn keep_best_rejected_prefers_higher_total() {
        let mut state = GraphState::new(Conversation::new(vec![Turn {
            speaker: Speaker::Customer,
            message: "hi".into(),
            timestamp: None,
        }]));

        state.draft = Some(draft_with_total(9));
        state.keep_best_rejected();
        state.draft = Some(draft_with_total(5));
        state.keep_best_rejected();

        assert!(state.draft.is_none());
        let best = state.best_rejected.unwrap();
        assert_eq!(best.scores.total_score(), 90);
    }

    #[test]
    fn keep_best_rejected_without_draft_is_a_no_op() {
        let mut state = GraphState::new(Conversation::new(vec![Turn {
            speaker: Speaker::Customer,
            message: "hi".into(),
            timestamp: None,
        }]));
        state.best_rejected = Some(draft_with_total(7));
        state.keep_best_rejected();
        assert_eq!(state.best_rejected.unwrap().scores.total_score(), 70);
    }

    #[test]
    fn rewritten_query_takes_precedence() {
        let mut state = GraphState::new(Conversation::new(vec![Turn {
            speaker: Speaker::Customer,
            message: "hi so um my package thing".into(),
            timestamp: None,
        }]));
        state.rewritten_query = Some("package delivery status".into());
        assert_eq!(state.retrieval_query(), "package delivery status");
    }

    #[test]
    fn llm_response_parses_with_defaults() {
        let json = r#"{
            "scores": {
                "clarification": 7, "empathy_tone": 8, "solution_accuracy": 9,
                "actionability": 6, "confirmation_closure": 7, "compliance_safety": 10
            },
            "improvements": [
                {"issue": "No closing check", "suggested": "Ask if anything else is needed"}
            ],
            "overall_feedback": "Good call overall."
        }"#;
        let parsed: LlmAnalysisResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.strengths.is_empty());
        assert_eq!(parsed.improvements.len(), 1);
        assert_eq!(parsed.improvements[0].priority, Priority::Important);
        let scores: Scores = parsed.scores.into();
        assert_eq!(scores.total_score(), ((47 * 100 + 30) / 60) as u8);
    }
}
