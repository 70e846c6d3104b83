use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{TicketPriority, TicketStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub estimated_hours: Option<f64>,
    /// Order of the ticket in the model's response.
    pub position: u32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
