use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PublishState;

/// Per-ticket checkpoint of the push to Jira (tracker A) and GitLab (tracker B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPublication {
    pub ticket_id: Uuid,
    pub state: PublishState,
    pub jira_key: Option<String>,
    pub gitlab_iid: Option<i64>,
    pub error_message: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl TicketPublication {
    pub fn not_started(ticket_id: Uuid) -> Self {
        Self {
            ticket_id,
            state: PublishState::NotStarted,
            jira_key: None,
            gitlab_iid: None,
            error_message: None,
            updated_at: chrono::Local::now().naive_local(),
        }
    }
}
