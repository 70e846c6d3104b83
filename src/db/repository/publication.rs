use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{now, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::PublishState;
use crate::models::TicketPublication;

/// Insert or replace the checkpoint for one ticket.
pub fn save_publication(
    conn: &Connection,
    publication: &TicketPublication,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO ticket_publications (ticket_id, state, jira_key, gitlab_iid, error_message, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(ticket_id) DO UPDATE SET
            state = excluded.state,
            jira_key = excluded.jira_key,
            gitlab_iid = excluded.gitlab_iid,
            error_message = excluded.error_message,
            updated_at = excluded.updated_at",
        params![
            publication.ticket_id.to_string(),
            publication.state.as_str(),
            publication.jira_key,
            publication.gitlab_iid,
            publication.error_message,
            now().to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_publication(
    conn: &Connection,
    ticket_id: &Uuid,
) -> Result<Option<TicketPublication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT ticket_id, state, jira_key, gitlab_iid, error_message, updated_at
         FROM ticket_publications WHERE ticket_id = ?1",
    )?;

    match stmt.query_row(params![ticket_id.to_string()], read_publication_row) {
        Ok(row) => Ok(Some(publication_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Checkpoints for every ticket of a document, in ticket order.
pub fn list_publications(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<TicketPublication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.ticket_id, p.state, p.jira_key, p.gitlab_iid, p.error_message, p.updated_at
         FROM ticket_publications p
         JOIN tickets t ON t.id = p.ticket_id
         WHERE t.document_id = ?1
         ORDER BY t.position ASC",
    )?;

    let rows = stmt.query_map(params![document_id.to_string()], read_publication_row)?;

    let mut publications = Vec::new();
    for row in rows {
        publications.push(publication_from_row(row?)?);
    }
    Ok(publications)
}

/// True once any publish attempt touched this document.
pub fn has_publications(conn: &Connection, document_id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ticket_publications p
         JOIN tickets t ON t.id = p.ticket_id
         WHERE t.document_id = ?1",
        params![document_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

struct PublicationRow {
    ticket_id: String,
    state: String,
    jira_key: Option<String>,
    gitlab_iid: Option<i64>,
    error_message: Option<String>,
    updated_at: String,
}

fn read_publication_row(row: &Row<'_>) -> rusqlite::Result<PublicationRow> {
    Ok(PublicationRow {
        ticket_id: row.get(0)?,
        state: row.get(1)?,
        jira_key: row.get(2)?,
        gitlab_iid: row.get(3)?,
        error_message: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn publication_from_row(row: PublicationRow) -> Result<TicketPublication, DatabaseError> {
    Ok(TicketPublication {
        ticket_id: parse_uuid(&row.ticket_id)?,
        state: PublishState::from_str(&row.state)?,
        jira_key: row.jira_key,
        gitlab_iid: row.gitlab_iid,
        error_message: row.error_message,
        updated_at: parse_timestamp(&row.updated_at),
    })
}
