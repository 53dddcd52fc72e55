//! History store: conversations, analysis results, KPI feedback and rollups.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{
    grade_for, AnalysisResult, Conversation, DashboardStats, HistorySummary, Improvement,
    Scores, Turn,
};

/// Sort order for the history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Date,
    Score,
}

impl SortBy {
    pub fn parse(value: &str) -> Self {
        match value {
            "score" => Self::Score,
            _ => Self::Date,
        }
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptValue {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::CorruptValue {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

/// Insert a conversation row. Assigns id and created_at when absent.
/// Returns the stored conversation id.
pub fn save_conversation(
    conn: &Connection,
    conversation: &Conversation,
) -> Result<Uuid, DatabaseError> {
    let id = conversation.id.unwrap_or_else(Uuid::new_v4);
    let created_at = conversation.created_at.unwrap_or_else(Utc::now);
    let turns_json = to_json("turns", &conversation.turns)?;

    conn.execute(
        "INSERT OR IGNORE INTO conversations (id, created_at, turns) VALUES (?1, ?2, ?3)",
        params![id, created_at, turns_json],
    )?;

    Ok(id)
}

pub fn get_conversation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Conversation>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, created_at, turns FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, Uuid>(0)?,
                    row.get::<_, DateTime<Utc>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, created_at, turns_json)) => {
            let turns: Vec<Turn> = json_column("turns", &turns_json)?;
            Ok(Some(Conversation {
                id: Some(id),
                created_at: Some(created_at),
                turns,
            }))
        }
        None => Ok(None),
    }
}

/// Insert an analysis result. Idempotent on request_id: a second save
/// with the same key is a no-op and returns false.
pub fn save_analysis(conn: &Connection, result: &AnalysisResult) -> Result<bool, DatabaseError> {
    let strengths_json = to_json("strengths", &result.strengths)?;
    let improvements_json = to_json("improvements", &result.improvements)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO analysis_results (
            request_id, conversation_id, analyzed_at,
            clarification_score, empathy_tone_score, solution_accuracy_score,
            actionability_score, confirmation_closure_score, compliance_safety_score,
            total_score, strengths, improvements, overall_feedback,
            is_resolved, csat_score, is_verified, analysis_ms
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            result.request_id,
            result.conversation_id,
            result.analyzed_at,
            result.scores.clarification,
            result.scores.empathy_tone,
            result.scores.solution_accuracy,
            result.scores.actionability,
            result.scores.confirmation_closure,
            result.scores.compliance_safety,
            result.total_score,
            strengths_json,
            improvements_json,
            result.overall_feedback,
            result.is_resolved,
            result.csat_score,
            result.is_verified,
            result.analysis_ms as i64,
        ],
    )?;

    Ok(inserted > 0)
}

/// Persist a terminal result together with its source conversation in one
/// transaction. Nothing is written if either insert fails.
pub fn persist_result(
    conn: &mut Connection,
    conversation: &Conversation,
    result: &AnalysisResult,
) -> Result<bool, DatabaseError> {
    let tx = conn.transaction()?;
    save_conversation(&tx, conversation)?;
    let inserted = save_analysis(&tx, result)?;
    tx.commit()?;

    if inserted {
        tracing::info!(request_id = %result.request_id, "Analysis result saved");
    } else {
        tracing::debug!(request_id = %result.request_id, "Duplicate save ignored");
    }
    Ok(inserted)
}

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<(AnalysisResult, String, String)> {
    let scores = Scores {
        clarification: row.get(3)?,
        empathy_tone: row.get(4)?,
        solution_accuracy: row.get(5)?,
        actionability: row.get(6)?,
        confirmation_closure: row.get(7)?,
        compliance_safety: row.get(8)?,
    };
    let result = AnalysisResult {
        request_id: row.get(0)?,
        conversation_id: row.get(1)?,
        analyzed_at: row.get(2)?,
        scores,
        total_score: row.get(9)?,
        strengths: Vec::new(),
        improvements: Vec::new(),
        overall_feedback: row.get(12)?,
        is_resolved: row.get(13)?,
        csat_score: row.get(14)?,
        is_verified: row.get(15)?,
        analysis_ms: row.get::<_, i64>(16)? as u64,
    };
    Ok((result, row.get(10)?, row.get(11)?))
}

const RESULT_COLUMNS: &str = "request_id, conversation_id, analyzed_at, \
    clarification_score, empathy_tone_score, solution_accuracy_score, \
    actionability_score, confirmation_closure_score, compliance_safety_score, \
    total_score, strengths, improvements, overall_feedback, \
    is_resolved, csat_score, is_verified, analysis_ms";

pub fn get_analysis(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Option<AnalysisResult>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RESULT_COLUMNS} FROM analysis_results WHERE request_id = ?1"),
            params![request_id],
            row_to_result,
        )
        .optional()?;

    match row {
        Some((mut result, strengths_json, improvements_json)) => {
            result.strengths = json_column("strengths", &strengths_json)?;
            result.improvements =
                json_column::<Vec<Improvement>>("improvements", &improvements_json)?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

pub fn list_analyses(
    conn: &Connection,
    limit: usize,
    sort_by: SortBy,
) -> Result<Vec<HistorySummary>, DatabaseError> {
    let order = match sort_by {
        SortBy::Date => "analyzed_at DESC",
        SortBy::Score => "total_score DESC",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT request_id, analyzed_at, total_score FROM analysis_results \
         ORDER BY {order} LIMIT ?1"
    ))?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok((
            row.get::<_, Uuid>(0)?,
            row.get::<_, DateTime<Utc>>(1)?,
            row.get::<_, u8>(2)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (request_id, analyzed_at, total_score) = row?;
        items.push(HistorySummary {
            request_id,
            analyzed_at,
            total_score,
            grade: grade_for(total_score),
        });
    }
    Ok(items)
}

pub fn delete_analysis(conn: &Connection, request_id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM analysis_results WHERE request_id = ?1",
        params![request_id],
    )?;
    Ok(deleted > 0)
}

/// Update the KPI feedback fields. Returns false when the request is unknown.
pub fn update_feedback(
    conn: &Connection,
    request_id: &Uuid,
    is_resolved: Option<bool>,
    csat_score: Option<u8>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE analysis_results SET
            is_resolved = COALESCE(?2, is_resolved),
            csat_score = COALESCE(?3, csat_score)
         WHERE request_id = ?1",
        params![request_id, is_resolved, csat_score],
    )?;
    Ok(updated > 0)
}

/// KPI rollup. `resolution_rate` is resolved / rows-with-feedback, as a
/// fraction in [0,1]; 0.0 when no row has feedback yet.
pub fn dashboard_stats(conn: &Connection) -> Result<DashboardStats, DatabaseError> {
    conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(AVG(total_score), 0.0),
            SUM(CASE WHEN is_resolved = 1 THEN 1 ELSE 0 END),
            COUNT(is_resolved),
            COALESCE(AVG(analysis_ms), 0.0)
         FROM analysis_results",
        [],
        |row| {
            let total: i64 = row.get(0)?;
            let avg_score: f64 = row.get(1)?;
            let resolved: Option<i64> = row.get(2)?;
            let with_feedback: i64 = row.get(3)?;
            let avg_ms: f64 = row.get(4)?;

            let resolution_rate = if with_feedback > 0 {
                resolved.unwrap_or(0) as f64 / with_feedback as f64
            } else {
                0.0
            };

            Ok(DashboardStats {
                total_analyzed: total as u64,
                avg_score,
                resolution_rate,
                avg_analysis_seconds: avg_ms / 1000.0,
            })
        },
    )
    .map_err(DatabaseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Priority, Speaker};

    fn sample_conversation() -> Conversation {
        Conversation::new(vec![
            Turn {
                speaker: Speaker::Customer,
                message: "My refund never arrived.".into(),
                timestamp: None,
            },
            Turn {
                speaker: Speaker::Agent,
                message: "I'm sorry about that, let me check.".into(),
                timestamp: None,
            },
        ])
    }

    fn sample_result(request_id: Uuid, total: u8) -> AnalysisResult {
        let per_dim = 8;
        AnalysisResult {
            request_id,
            conversation_id: None,
            analyzed_at: Utc::now(),
            scores: Scores {
                clarification: per_dim,
                empathy_tone: per_dim,
                solution_accuracy: per_dim,
                actionability: per_dim,
                confirmation_closure: per_dim,
                compliance_safety: per_dim,
            },
            total_score: total,
            strengths: vec!["Apologized early".into()],
            improvements: vec![Improvement {
                issue: "No closing confirmation".into(),
                original: "Bye".into(),
                suggested: "Is there anything else I can help with?".into(),
                reason: "Customers need an explicit close".into(),
                priority: Priority::Important,
            }],
            overall_feedback: "Good empathy, weak closure.".into(),
            is_resolved: None,
            csat_score: None,
            is_verified: true,
            analysis_ms: 3200,
        }
    }

    #[test]
    fn conversation_round_trips() {
        let conn = open_memory_database().unwrap();
        let conv = sample_conversation();
        let id = save_conversation(&conn, &conv).unwrap();

        let loaded = get_conversation(&conn, &id).unwrap().unwrap();
        assert_eq!(loaded.turn_count(), 2);
        assert_eq!(loaded.turns[0].speaker, Speaker::Customer);
    }

    #[test]
    fn analysis_round_trips_with_json_fields() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        assert!(save_analysis(&conn, &sample_result(id, 80)).unwrap());

        let loaded = get_analysis(&conn, &id).unwrap().unwrap();
        assert_eq!(loaded.total_score, 80);
        assert_eq!(loaded.strengths, vec!["Apologized early".to_string()]);
        assert_eq!(loaded.improvements.len(), 1);
        assert_eq!(loaded.improvements[0].priority, Priority::Important);
        assert!(loaded.is_verified);
        assert_eq!(loaded.analysis_ms, 3200);
    }

    #[test]
    fn save_is_idempotent_per_request_id() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        assert!(save_analysis(&conn, &sample_result(id, 80)).unwrap());
        // Second save: no-op, no duplicate row.
        assert!(!save_analysis(&conn, &sample_result(id, 90)).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM analysis_results", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        // Original row untouched.
        assert_eq!(get_analysis(&conn, &id).unwrap().unwrap().total_score, 80);
    }

    #[test]
    fn persist_result_writes_conversation_and_result_atomically() {
        let mut conn = open_memory_database().unwrap();
        let mut conv = sample_conversation();
        conv.id = Some(Uuid::new_v4());
        let mut result = sample_result(Uuid::new_v4(), 75);
        result.conversation_id = conv.id;

        assert!(persist_result(&mut conn, &conv, &result).unwrap());
        assert!(get_conversation(&conn, &conv.id.unwrap()).unwrap().is_some());
        assert!(get_analysis(&conn, &result.request_id).unwrap().is_some());
    }

    #[test]
    fn list_sorted_by_date_then_by_score() {
        let conn = open_memory_database().unwrap();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();

        let mut first = sample_result(older, 95);
        first.analyzed_at = Utc::now() - chrono::Duration::hours(1);
        save_analysis(&conn, &first).unwrap();
        save_analysis(&conn, &sample_result(newer, 70)).unwrap();

        let by_date = list_analyses(&conn, 10, SortBy::Date).unwrap();
        assert_eq!(by_date[0].request_id, newer);

        let by_score = list_analyses(&conn, 10, SortBy::Score).unwrap();
        assert_eq!(by_score[0].request_id, older);
        assert_eq!(by_score[0].grade, "A");
    }

    #[test]
    fn list_respects_limit() {
        let conn = open_memory_database().unwrap();
        for _ in 0..5 {
            save_analysis(&conn, &sample_result(Uuid::new_v4(), 80)).unwrap();
        }
        assert_eq!(list_analyses(&conn, 3, SortBy::Date).unwrap().len(), 3);
    }

    #[test]
    fn feedback_update_and_not_found() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        save_analysis(&conn, &sample_result(id, 80)).unwrap();

        assert!(update_feedback(&conn, &id, Some(true), Some(5)).unwrap());
        let loaded = get_analysis(&conn, &id).unwrap().unwrap();
        assert_eq!(loaded.is_resolved, Some(true));
        assert_eq!(loaded.csat_score, Some(5));

        // Partial update keeps the other field.
        assert!(update_feedback(&conn, &id, None, Some(4)).unwrap());
        let loaded = get_analysis(&conn, &id).unwrap().unwrap();
        assert_eq!(loaded.is_resolved, Some(true));
        assert_eq!(loaded.csat_score, Some(4));

        assert!(!update_feedback(&conn, &Uuid::new_v4(), Some(true), None).unwrap());
    }

    #[test]
    fn delete_removes_row() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        save_analysis(&conn, &sample_result(id, 80)).unwrap();
        assert!(delete_analysis(&conn, &id).unwrap());
        assert!(!delete_analysis(&conn, &id).unwrap());
        assert!(get_analysis(&conn, &id).unwrap().is_none());
    }

    #[test]
    fn stats_empty_store_is_all_zero() {
        let conn = open_memory_database().unwrap();
        let stats = dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_analyzed, 0);
        assert_eq!(stats.avg_score, 0.0);
        assert_eq!(stats.resolution_rate, 0.0);
        assert_eq!(stats.avg_analysis_seconds, 0.0);
    }

    #[test]
    fn resolution_rate_uses_feedback_rows_only() {
        let conn = open_memory_database().unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        save_analysis(&conn, &sample_result(a, 80)).unwrap();
        save_analysis(&conn, &sample_result(b, 60)).unwrap();
        // Third row never gets feedback: excluded from the denominator.
        save_analysis(&conn, &sample_result(Uuid::new_v4(), 90)).unwrap();

        update_feedback(&conn, &a, Some(true), Some(5)).unwrap();
        update_feedback(&conn, &b, Some(false), None).unwrap();

        let stats = dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_analyzed, 3);
        assert!((stats.resolution_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.avg_analysis_seconds > 3.0);
    }
}
