//! Repository layer — entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection` so callers decide the
//! transaction boundary. Status writes are conditional on the current status.

mod document;
mod publication;
mod ticket;

use chrono::NaiveDateTime;

use super::DatabaseError;

pub use document::*;
pub use publication::*;
pub use ticket::*;

/// Timestamps are stored as `NaiveDateTime::to_string()` output.
fn parse_timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or_default()
}

fn parse_uuid(raw: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
