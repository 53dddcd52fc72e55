//! Request and response DTOs for the HTTP surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{grade_for, AnalysisResult};

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub transcript: String,
}

/// Analysis response: the stored result plus its derived letter grade.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub grade: &'static str,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(result: AnalysisResult) -> Self {
        let grade = grade_for(result.total_score);
        Self { result, grade }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub items: Vec<crate::models::HistorySummary>,
    pub count: usize,
}

/// Stored result plus the conversation it was produced from.
#[derive(Debug, Serialize)]
pub struct HistoryDetailResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub conversation_data: Option<crate::models::Conversation>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sort: Option<String>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub is_resolved: Option<bool>,
    #[serde(default)]
    pub csat_score: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct FaqUrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct FaqTextRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FaqStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct FaqUpdateRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub document_id: Uuid,
    pub name: String,
    pub chunk_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scores;
    use chrono::Utc;

    #[test]
    fn analyze_response_flattens_result_and_adds_grade() {
        let result = AnalysisResult {
            request_id: Uuid::new_v4(),
            conversation_id: None,
            analyzed_at: Utc::now(),
            scores: Scores {
                clarification: 10,
                empathy_tone: 9,
                solution_accuracy: 9,
                actionability: 9,
                confirmation_closure: 9,
                compliance_safety: 9,
            },
            total_score: 92,
            strengths: vec![],
            improvements: vec![],
            overall_feedback: "Excellent".into(),
            is_resolved: None,
            csat_score: None,
            is_verified: true,
            analysis_ms: 1000,
        };
        let response = AnalyzeResponse::from(result);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["grade"], "A");
        assert_eq!(json["total_score"], 92);
        assert!(json.get("result").is_none(), "result must be flattened");
    }

    #[test]
    fn history_query_defaults() {
        let q: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 50);
        assert!(q.sort.is_none());
    }
}
