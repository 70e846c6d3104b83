use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::DocumentStatus;
use crate::models::{Document, Ticket};

const DOCUMENT_COLUMNS: &str = "id, file_name, file_path, content_hash, content, status,
    error_message, scope_summary, clarifying_questions, uploaded_at";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, file_name, file_path, content_hash, content, status,
         error_message, scope_summary, clarifying_questions, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.id.to_string(),
            doc.file_name,
            doc.file_path,
            doc.content_hash,
            doc.content,
            doc.status.as_str(),
            doc.error_message,
            doc.scope_summary,
            doc.clarifying_questions,
            doc.uploaded_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], read_document_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like `get_document`, but a missing row is an error.
pub fn require_document(conn: &Connection, id: &Uuid) -> Result<Document, DatabaseError> {
    get_document(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Document".into(),
        id: id.to_string(),
    })
}

/// All documents, newest upload first.
pub fn list_documents(conn: &Connection) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY uploaded_at DESC"
    ))?;

    let rows = stmt.query_map([], read_document_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Save extracted text. Only an UNPROCESSED document accepts new content.
pub fn store_extracted_content(
    conn: &Connection,
    document_id: &Uuid,
    content: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET content = ?2 WHERE id = ?1 AND status = 'UNPROCESSED'",
        params![document_id.to_string(), content],
    )?;
    if rows == 0 {
        return Err(conflict_or_missing(conn, document_id, &[DocumentStatus::Unprocessed]));
    }
    Ok(())
}

/// Check-and-set status update.
///
/// Succeeds only if the document's current status is one of `expected`.
/// `error_message` replaces the stored message (None clears it).
pub fn transition_status(
    conn: &Connection,
    document_id: &Uuid,
    expected: &[DocumentStatus],
    next: DocumentStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    if expected.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "status transition without expected source status".into(),
        ));
    }

    let placeholders: Vec<String> = (0..expected.len()).map(|i| format!("?{}", i + 4)).collect();
    let sql = format!(
        "UPDATE documents SET status = ?2, error_message = ?3
         WHERE id = ?1 AND status IN ({})",
        placeholders.join(", ")
    );

    let mut values: Vec<Option<String>> = vec![
        Some(document_id.to_string()),
        Some(next.as_str().to_string()),
        error_message.map(str::to_string),
    ];
    values.extend(expected.iter().map(|s| Some(s.as_str().to_string())));

    let rows = conn.execute(&sql, params_from_iter(values))?;
    if rows == 0 {
        return Err(conflict_or_missing(conn, document_id, expected));
    }
    Ok(())
}

/// Persist one derivation atomically: tickets, summary, questions, and the
/// PROCESSING → PROCESSED transition commit together or not at all.
pub fn commit_derivation(
    conn: &Connection,
    document_id: &Uuid,
    tickets: &[Ticket],
    scope_summary: &str,
    clarifying_questions: &str,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    super::insert_tickets(&tx, tickets)?;

    let rows = tx.execute(
        "UPDATE documents SET scope_summary = ?2, clarifying_questions = ?3,
         status = 'PROCESSED', error_message = NULL
         WHERE id = ?1 AND status = 'PROCESSING'",
        params![document_id.to_string(), scope_summary, clarifying_questions],
    )?;
    if rows == 0 {
        // Dropping the transaction rolls back the ticket inserts.
        return Err(conflict_or_missing(&tx, document_id, &[DocumentStatus::Processing]));
    }

    tx.commit()?;
    Ok(())
}

/// Delete a document. Tickets and publication records go with it (CASCADE).
pub fn delete_document(conn: &Connection, document_id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM documents WHERE id = ?1",
        params![document_id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: document_id.to_string(),
        });
    }
    Ok(())
}

fn conflict_or_missing(
    conn: &Connection,
    document_id: &Uuid,
    expected: &[DocumentStatus],
) -> DatabaseError {
    match get_document(conn, document_id) {
        Ok(Some(doc)) => DatabaseError::StatusConflict {
            id: document_id.to_string(),
            actual: doc.status,
            expected: expected.to_vec(),
        },
        Ok(None) => DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: document_id.to_string(),
        },
        Err(e) => e,
    }
}

struct DocumentRow {
    id: String,
    file_name: String,
    file_path: String,
    content_hash: Option<String>,
    content: Option<String>,
    status: String,
    error_message: Option<String>,
    scope_summary: Option<String>,
    clarifying_questions: Option<String>,
    uploaded_at: String,
}

fn read_document_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        content_hash: row.get(3)?,
        content: row.get(4)?,
        status: row.get(5)?,
        error_message: row.get(6)?,
        scope_summary: row.get(7)?,
        clarifying_questions: row.get(8)?,
        uploaded_at: row.get(9)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: parse_uuid(&row.id)?,
        file_name: row.file_name,
        file_path: row.file_path,
        content_hash: row.content_hash,
        content: row.content,
        status: DocumentStatus::from_str(&row.status)?,
        error_message: row.error_message,
        scope_summary: row.scope_summary,
        clarifying_questions: row.clarifying_questions,
        uploaded_at: parse_timestamp(&row.uploaded_at),
    })
}
