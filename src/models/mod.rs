pub mod enums;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use enums::{Priority, SourceType, Speaker};

/// A single utterance in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A complete customer-service conversation. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            id: None,
            created_at: None,
            turns,
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn customer_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns
            .iter()
            .filter(|t| t.speaker == Speaker::Customer)
    }

    pub fn agent_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.speaker == Speaker::Agent)
    }

    /// Concatenated customer messages — the fallback retrieval query.
    pub fn customer_text(&self) -> String {
        self.customer_turns()
            .map(|t| t.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The six quality dimension scores, each 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub clarification: u8,
    pub empathy_tone: u8,
    pub solution_accuracy: u8,
    pub actionability: u8,
    pub confirmation_closure: u8,
    pub compliance_safety: u8,
}

impl Scores {
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.clarification,
            self.empathy_tone,
            self.solution_accuracy,
            self.actionability,
            self.confirmation_closure,
            self.compliance_safety,
        ]
    }

    /// All six dimensions within the 1..=10 contract.
    pub fn in_range(&self) -> bool {
        self.as_array().iter().all(|s| (1..=10).contains(s))
    }

    /// Derived total on a 0..=100 scale: round(sum * 100 / 60).
    pub fn total_score(&self) -> u8 {
        let sum: u32 = self.as_array().iter().map(|&s| s as u32).sum();
        ((sum * 100 + 30) / 60) as u8
    }
}

/// One coaching improvement item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Improvement {
    pub issue: String,
    pub original: String,
    pub suggested: String,
    pub reason: String,
    pub priority: Priority,
}

/// Terminal output of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub analyzed_at: DateTime<Utc>,
    pub scores: Scores,
    pub total_score: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<Improvement>,
    pub overall_feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_resolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csat_score: Option<u8>,
    /// False when the verifier never accepted this draft (degraded result).
    pub is_verified: bool,
    /// Wall time of the analysis workflow, in milliseconds.
    pub analysis_ms: u64,
}

/// Letter grade for a total score.
pub fn grade_for(total_score: u8) -> &'static str {
    match total_score {
        90..=100 => "A",
        80..=89 => "B",
        70..=79 => "C",
        60..=69 => "D",
        _ => "F",
    }
}

/// One row of the history list view.
#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub request_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub total_score: u8,
    pub grade: &'static str,
}

/// A knowledge-base document. Activation is document-level only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqDocument {
    pub id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Retrieved evidence attached to a draft for grounding checks.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: f32,
}

/// KPI rollup over stored analysis results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_analyzed: u64,
    pub avg_score: f64,
    pub resolution_rate: f64,
    pub avg_analysis_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: [u8; 6]) -> Scores {
        Scores {
            clarification: values[0],
            empathy_tone: values[1],
            solution_accuracy: values[2],
            actionability: values[3],
            confirmation_closure: values[4],
            compliance_safety: values[5],
        }
    }

    #[test]
    fn total_score_is_rounded_percentage() {
        // 48/60 -> 80
        assert_eq!(scores([8; 6]).total_score(), 80);
        // 60/60 -> 100
        assert_eq!(scores([10; 6]).total_score(), 100);
        // 6/60 -> 10
        assert_eq!(scores([1; 6]).total_score(), 10);
        // 41/60 = 68.33 -> 68
        assert_eq!(scores([7, 7, 7, 7, 7, 6]).total_score(), 68);
        // 43/60 = 71.66 -> 72
        assert_eq!(scores([7, 7, 7, 7, 7, 8]).total_score(), 72);
    }

    #[test]
    fn total_score_always_in_bounds() {
        for a in 1..=10u8 {
            for b in 1..=10u8 {
                let s = scores([a, b, 5, 5, 5, 5]);
                assert!(s.total_score() <= 100);
            }
        }
    }

    #[test]
    fn in_range_rejects_out_of_bounds() {
        assert!(scores([1, 10, 5, 5, 5, 5]).in_range());
        assert!(!scores([0, 10, 5, 5, 5, 5]).in_range());
        assert!(!scores([1, 11, 5, 5, 5, 5]).in_range());
    }

    #[test]
    fn grades_follow_thresholds() {
        assert_eq!(grade_for(95), "A");
        assert_eq!(grade_for(90), "A");
        assert_eq!(grade_for(89), "B");
        assert_eq!(grade_for(70), "C");
        assert_eq!(grade_for(65), "D");
        assert_eq!(grade_for(59), "F");
        assert_eq!(grade_for(0), "F");
    }

    #[test]
    fn customer_text_concatenates_in_order() {
        let conv = Conversation::new(vec![
            Turn {
                speaker: Speaker::Agent,
                message: "Hello, how can I help?".into(),
                timestamp: None,
            },
            Turn {
                speaker: Speaker::Customer,
                message: "My order is late.".into(),
                timestamp: None,
            },
            Turn {
                speaker: Speaker::Customer,
                message: "Order #1234.".into(),
                timestamp: None,
            },
        ]);
        assert_eq!(conv.customer_text(), "My order is late. Order #1234.");
        assert_eq!(conv.agent_turns().count(), 1);
        assert_eq!(conv.turn_count(), 3);
    }

    #[test]
    fn analysis_result_serializes_skip_absent_kpis() {
        let result = AnalysisResult {
            request_id: Uuid::new_v4(),
            conversation_id: None,
            analyzed_at: Utc::now(),
            scores: scores([8; 6]),
            total_score: 80,
            strengths: vec!["Clear greeting".into()],
            improvements: vec![],
            overall_feedback: "Solid call".into(),
            is_resolved: None,
            csat_score: None,
            is_verified: true,
            analysis_ms: 1200,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("is_resolved").is_none());
        assert!(json.get("csat_score").is_none());
        assert_eq!(json["total_score"], 80);
    }
}
