//! Knowledge store: FAQ documents and their embedded chunks.
//!
//! Document + chunk writes are transactional so retrieval never observes a
//! document with a partial chunk set. Activation lives on the document row
//! only; chunks inherit it through the join at query time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{FaqDocument, SourceType};

/// One chunk row eligible for similarity scoring.
#[derive(Debug, Clone)]
pub struct ActiveChunk {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    pub document_name: String,
    pub url: Option<String>,
    pub document_created_at: DateTime<Utc>,
}

/// A document row with its chunk count, for list views.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentListItem {
    #[serde(flatten)]
    pub document: FaqDocument,
    pub chunk_count: usize,
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>, DatabaseError> {
    if blob.len() % 4 != 0 {
        return Err(DatabaseError::CorruptValue {
            column: "embedding".into(),
            reason: format!("blob length {} not a multiple of 4", blob.len()),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Insert a document and all its chunks as one atomic unit.
pub fn insert_document_with_chunks(
    conn: &mut Connection,
    document: &FaqDocument,
    chunks: &[String],
    embeddings: &[Vec<f32>],
) -> Result<usize, DatabaseError> {
    debug_assert_eq!(chunks.len(), embeddings.len());

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO faq_documents (id, name, source_type, url, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            document.id,
            document.name,
            document.source_type.as_str(),
            document.url,
            document.is_active,
            document.created_at,
        ],
    )?;
    insert_chunks(&tx, &document.id, chunks, embeddings)?;
    tx.commit()?;

    tracing::info!(document_id = %document.id, chunks = chunks.len(), "FAQ document stored");
    Ok(chunks.len())
}

/// Replace all chunks of an existing document atomically, preserving its id.
pub fn replace_document_chunks(
    conn: &mut Connection,
    document_id: &Uuid,
    chunks: &[String],
    embeddings: &[Vec<f32>],
) -> Result<usize, DatabaseError> {
    if get_document(conn, document_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "faq_document".into(),
            id: document_id.to_string(),
        });
    }

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM faq_chunks WHERE document_id = ?1",
        params![document_id],
    )?;
    insert_chunks(&tx, document_id, chunks, embeddings)?;
    tx.commit()?;

    tracing::info!(document_id = %document_id, chunks = chunks.len(), "FAQ document re-embedded");
    Ok(chunks.len())
}

fn insert_chunks(
    conn: &Connection,
    document_id: &Uuid,
    chunks: &[String],
    embeddings: &[Vec<f32>],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO faq_chunks (document_id, chunk_index, content, embedding)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (index, (content, embedding)) in chunks.iter().zip(embeddings.iter()).enumerate() {
        stmt.execute(params![
            document_id,
            index as i64,
            content,
            embedding_to_blob(embedding),
        ])?;
    }
    Ok(())
}

pub fn get_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<FaqDocument>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, source_type, url, is_active, created_at
         FROM faq_documents WHERE id = ?1",
        params![document_id],
        row_to_document,
    )
    .optional()
    .map_err(DatabaseError::from)
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<FaqDocument> {
    let source_type_raw: String = row.get(2)?;
    let source_type = SourceType::parse(&source_type_raw).unwrap_or(SourceType::Text);
    Ok(FaqDocument {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type,
        url: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn list_documents(
    conn: &Connection,
    include_inactive: bool,
) -> Result<Vec<DocumentListItem>, DatabaseError> {
    let filter = if include_inactive {
        ""
    } else {
        "WHERE d.is_active = 1"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT d.id, d.name, d.source_type, d.url, d.is_active, d.created_at,
                (SELECT COUNT(*) FROM faq_chunks c WHERE c.document_id = d.id)
         FROM faq_documents d {filter}
         ORDER BY d.created_at DESC"
    ))?;

    let rows = stmt.query_map([], |row| {
        let document = row_to_document(row)?;
        let chunk_count: i64 = row.get(6)?;
        Ok(DocumentListItem {
            document,
            chunk_count: chunk_count as usize,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(DatabaseError::from)
}

/// Toggle retrieval eligibility for all of a document's chunks at once.
pub fn set_document_active(
    conn: &Connection,
    document_id: &Uuid,
    is_active: bool,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE faq_documents SET is_active = ?2 WHERE id = ?1",
        params![document_id, is_active],
    )?;
    Ok(updated > 0)
}

/// Delete a document; chunks go with it (ON DELETE CASCADE).
pub fn delete_document(conn: &Connection, document_id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM faq_documents WHERE id = ?1",
        params![document_id],
    )?;
    if deleted > 0 {
        tracing::info!(document_id = %document_id, "FAQ document deleted");
    }
    Ok(deleted > 0)
}

/// Load every chunk whose owning document is active, with the document
/// metadata needed for ranking tie-breaks.
pub fn load_active_chunks(conn: &Connection) -> Result<Vec<ActiveChunk>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.document_id, c.chunk_index, c.content, c.embedding,
                d.name, d.url, d.created_at
         FROM faq_chunks c
         JOIN faq_documents d ON d.id = c.document_id
         WHERE d.is_active = 1",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Uuid>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Vec<u8>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, DateTime<Utc>>(6)?,
        ))
    })?;

    let mut chunks = Vec::new();
    for row in rows {
        let (document_id, chunk_index, content, blob, name, url, created_at) = row?;
        chunks.push(ActiveChunk {
            document_id,
            chunk_index: chunk_index as usize,
            content,
            embedding: blob_to_embedding(&blob)?,
            document_name: name,
            url,
            document_created_at: created_at,
        });
    }
    Ok(chunks)
}

pub fn count_chunks(conn: &Connection, document_id: &Uuid) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM faq_chunks WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
