//! Similarity search over active FAQ chunks.
//!
//! Embeds the query, scores every active chunk with cosine similarity,
//! filters below the relevance floor, and returns the top k. Ties break
//! on newest document first, then lowest chunk index.

use std::cmp::Ordering;
use std::sync::Mutex;

use rusqlite::Connection;

use super::embedding::{cosine_similarity, Embedder};
use super::KnowledgeError;
use crate::db::knowledge::{load_active_chunks, ActiveChunk};
use crate::models::Reference;

/// Retrieve up to `top_k` references for `query`, dropping anything that
/// scores below `min_score`. An empty or fully inactive store yields an
/// empty list, never an error.
pub async fn retrieve<E: Embedder>(
    conn: &Mutex<Connection>,
    embedder: &E,
    query: &str,
    top_k: usize,
    min_score: f32,
) -> Result<Vec<Reference>, KnowledgeError> {
    if query.trim().is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(query).await?;

    let chunks = {
        let guard = conn.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
        load_active_chunks(&guard)?
    };
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(f32, ActiveChunk)> = chunks
        .into_iter()
        .map(|chunk| (cosine_similarity(&query_vector, &chunk.embedding), chunk))
        .filter(|(score, _)| *score >= min_score)
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.document_created_at.cmp(&a.document_created_at))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(top_k);

    tracing::debug!(
        candidates = scored.len(),
        top_k,
        min_score,
        "retrieval complete"
    );

    Ok(scored
        .into_iter()
        .map(|(score, chunk)| Reference {
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            source_name: chunk.document_name,
            url: chunk.url,
            score,
        })
        .collect())
}
