use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{now, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{TicketPriority, TicketStatus};
use crate::models::Ticket;

const TICKET_COLUMNS: &str = "id, document_id, title, description, priority, status,
    estimated_hours, position, created_at, updated_at";

/// Insert a batch of tickets. Callers wrap this in a transaction.
pub fn insert_tickets(conn: &Connection, tickets: &[Ticket]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO tickets (id, document_id, title, description, priority, status,
         estimated_hours, position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for ticket in tickets {
        stmt.execute(params![
            ticket.id.to_string(),
            ticket.document_id.to_string(),
            ticket.title,
            ticket.description,
            ticket.priority.as_str(),
            ticket.status.as_str(),
            ticket.estimated_hours,
            ticket.position,
            ticket.created_at.to_string(),
            ticket.updated_at.to_string(),
        ])?;
    }
    Ok(())
}

/// Tickets of a document in the order the model produced them.
pub fn list_tickets(conn: &Connection, document_id: &Uuid) -> Result<Vec<Ticket>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE document_id = ?1
         ORDER BY position ASC, created_at ASC"
    ))?;

    let rows = stmt.query_map(params![document_id.to_string()], read_ticket_row)?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(ticket_from_row(row?)?);
    }
    Ok(tickets)
}

pub fn get_ticket(conn: &Connection, ticket_id: &Uuid) -> Result<Option<Ticket>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"))?;

    match stmt.query_row(params![ticket_id.to_string()], read_ticket_row) {
        Ok(row) => Ok(Some(ticket_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move a ticket along PENDING / IN_PROGRESS / COMPLETED.
pub fn update_ticket_status(
    conn: &Connection,
    ticket_id: &Uuid,
    status: TicketStatus,
) -> Result<Ticket, DatabaseError> {
    let rows = conn.execute(
        "UPDATE tickets SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![ticket_id.to_string(), status.as_str(), now().to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Ticket".into(),
            id: ticket_id.to_string(),
        });
    }
    get_ticket(conn, ticket_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Ticket".into(),
        id: ticket_id.to_string(),
    })
}

struct TicketRow {
    id: String,
    document_id: String,
    title: String,
    description: String,
    priority: String,
    status: String,
    estimated_hours: Option<f64>,
    position: u32,
    created_at: String,
    updated_at: String,
}

fn read_ticket_row(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: row.get(4)?,
        status: row.get(5)?,
        estimated_hours: row.get(6)?,
        position: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn ticket_from_row(row: TicketRow) -> Result<Ticket, DatabaseError> {
    Ok(Ticket {
        id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        title: row.title,
        description: row.description,
        priority: TicketPriority::from_str(&row.priority)?,
        status: TicketStatus::from_str(&row.status)?,
        estimated_hours: row.estimated_hours,
        position: row.position,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}
