use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub content_hash: Option<String>,
    pub content: Option<String>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub scope_summary: Option<String>,
    pub clarifying_questions: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

impl Document {
    /// Fresh record for an upload that has not been extracted yet.
    pub fn new_upload(file_name: &str, file_path: &str, content_hash: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            content_hash,
            content: None,
            status: DocumentStatus::Unprocessed,
            error_message: None,
            scope_summary: None,
            clarifying_questions: None,
            uploaded_at: chrono::Local::now().naive_local(),
        }
    }

    /// True when extracted text exists and is not just whitespace.
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}
