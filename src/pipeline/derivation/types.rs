use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GenerationError;
use crate::models::enums::{TicketPriority, TicketStatus};
use crate::models::Ticket;

/// The three independent things derived from one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationKind {
    Tickets,
    ScopeSummary,
    ClarifyingQuestions,
}

impl DerivationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::ScopeSummary => "scope_summary",
            Self::ClarifyingQuestions => "clarifying_questions",
        }
    }
}

/// Outcome of one sub-derivation. A degraded result still carries a usable
/// value, so callers never branch on success to decide what to persist.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived<T> {
    Ok(T),
    Degraded { fallback: T, reason: String },
}

impl<T> Derived<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Ok(v) => v,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ok(v) => v,
            Self::Degraded { fallback, .. } => fallback,
        }
    }
}

/// A validated ticket record from the model response, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub estimated_hours: f64,
}

impl DerivedTicket {
    pub fn into_ticket(self, document_id: Uuid, position: u32) -> Ticket {
        let now = chrono::Local::now().naive_local();
        Ticket {
            id: Uuid::new_v4(),
            document_id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            status: TicketStatus::Pending,
            estimated_hours: Some(self.estimated_hours),
            position,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Text generation backend (allows mocking).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        kind: DerivationKind,
        prompt: &str,
        system: &str,
    ) -> Result<String, GenerationError>;
}
