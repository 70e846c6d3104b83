//! Document status state machine.
//!
//! ```text
//! UNPROCESSED ──claim──▶ PROCESSING ──commit──▶ PROCESSED ──publish──▶ PUSHED
//!      │                     │                      │                    │
//!      ├─▶ ERROR (no text)   └─▶ FAILED             └──▶ FAILED ◀────────┘
//!      └─▶ FAILED                                        │
//!                                        (publish retry) └──▶ PUSHED
//! ```
//!
//! Every write goes through `transition`, which rejects edges that are not
//! in the table and then performs a conditional update, so two writers
//! racing on one document cannot both win.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::DocumentStatus;

use DocumentStatus::*;

/// Whether `from → to` is an edge of the state machine.
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    matches!(
        (from, to),
        (Unprocessed, Processing)
            | (Unprocessed, Processed)
            | (Processing, Processed)
            | (Unprocessed, Error)
            | (Unprocessed, Failed)
            | (Processing, Failed)
            | (Processed, Pushed)
            | (Processed, Failed)
            | (Pushed, Failed)
            | (Failed, Pushed)
    )
}

/// Statuses from which a publish may start.
pub const PUBLISHABLE: &[DocumentStatus] = &[Processed, Pushed, Failed];

/// Validate every `from → to` edge, then apply it with check-and-set.
pub fn transition(
    conn: &Connection,
    document_id: &Uuid,
    from: &[DocumentStatus],
    to: DocumentStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    if let Some(bad) = from.iter().find(|f| !can_transition(**f, to)) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "illegal document status transition {bad} -> {to}"
        )));
    }
    db::transition_status(conn, document_id, from, to, error_message)
}

/// Move every document still in PROCESSING to FAILED.
///
/// Only valid at startup, before any derivation task exists: a PROCESSING
/// row at that point belongs to a run the previous process never finished.
pub fn fail_interrupted(conn: &Connection, reason: &str) -> Result<Vec<Uuid>, DatabaseError> {
    let stale: Vec<Uuid> = db::list_documents(conn)?
        .into_iter()
        .filter(|doc| doc.status == Processing)
        .map(|doc| doc.id)
        .collect();
    for id in &stale {
        transition(conn, id, &[Processing], Failed, Some(reason))?;
    }
    Ok(stale)
}
