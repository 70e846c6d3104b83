//! Shared types for the HTTP API layer.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::enums::{DocumentStatus, TicketStatus};
use crate::models::{Document, Ticket};
use crate::pipeline::processor::DeriveMode;

/// Characters of extracted text echoed back after an upload.
pub const CONTENT_PREVIEW_CHARS: usize = 500;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Parse a path segment as a UUID, or reject with 400.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}

// ═══════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub derive: Option<DeriveMode>,
}

/// GitLab project ids arrive as numbers or as `group/project` strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    Number(i64),
    Text(String),
}

impl ProjectRef {
    pub fn as_project(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub project_key: Option<String>,
    pub gitlab_project_id: Option<ProjectRef>,
}

impl PushRequest {
    /// Both targets are required; blank values count as missing.
    pub fn targets(&self) -> Result<(String, String), ApiError> {
        let jira = self
            .project_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let gitlab = self.gitlab_project_id.as_ref().and_then(ProjectRef::as_project);
        match (jira, gitlab) {
            (Some(jira), Some(gitlab)) => Ok((jira, gitlab)),
            _ => Err(ApiError::BadRequest(
                "project_key and gitlab_project_id are required".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: TicketStatus,
}

// ═══════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub message: String,
    pub status: DocumentStatus,
    pub tickets_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
}

/// A document with its tickets inlined.
#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct DocumentContent {
    pub id: Uuid,
    pub file_name: String,
    pub content: Option<String>,
    pub status: DocumentStatus,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub status: &'static str,
    pub message: String,
    pub published: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub tickets: Vec<Ticket>,
    pub scope_summary: String,
    pub clarifying_questions: String,
}

/// Compact row for document listings.
#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: Uuid,
    pub file_name: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

impl From<Document> for DocumentListItem {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            file_name: doc.file_name,
            status: doc.status,
            error_message: doc.error_message,
            uploaded_at: doc.uploaded_at,
        }
    }
}

/// First `CONTENT_PREVIEW_CHARS` characters, with `...` when cut.
pub fn content_preview(content: &str) -> String {
    match content.char_indices().nth(CONTENT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
