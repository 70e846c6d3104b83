//! Document endpoints: upload, inspect, delete, view, push.
//!
//! `POST /api/documents/upload` accepts a multipart `file` field and runs
//! the import → extract → derive pipeline before answering (unless
//! `?derive=async` or `?derive=none`).

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{
    content_preview, parse_id, ApiContext, DocumentContent, DocumentDetail, DocumentListItem,
    PushRequest, PushResponse, UploadQuery, UploadResponse,
};
use crate::db;
use crate::models::enums::DocumentStatus;
use crate::models::TicketPublication;

const DEFAULT_FILE_NAME: &str = "document";

/// `POST /api/documents/upload`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        file = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    let mode = query.derive.unwrap_or_default();

    tracing::info!(file_name, size = bytes.len(), ?mode, "Upload received");
    let outcome = ctx
        .core
        .processor()
        .process_upload(&file_name, bytes, mode)
        .await?;

    let document = outcome.document;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: document.id,
            message: outcome.message,
            status: document.status,
            tickets_count: outcome.tickets_count,
            content_preview: document.content.as_deref().map(content_preview),
        }),
    ))
}

/// `GET /api/documents` — newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<DocumentListItem>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let documents = db::list_documents(&conn)?;
    Ok(Json(documents.into_iter().map(DocumentListItem::from).collect()))
}

/// `GET /api/documents/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let document = db::require_document(&conn, &id)?;
    let tickets = db::list_tickets(&conn, &id)?;
    Ok(Json(DocumentDetail { document, tickets }))
}

/// `DELETE /api/documents/:id` — removes tickets and publication records
/// with the row, then the stored file.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let document = {
        let conn = ctx.core.open_db()?;
        let document = db::require_document(&conn, &id)?;
        if document.status == DocumentStatus::Processing {
            return Err(ApiError::Conflict(
                "Document is being processed and cannot be deleted".into(),
            ));
        }
        if ctx.core.publisher().is_publishing(&id) {
            return Err(ApiError::Conflict(
                "Document is being published and cannot be deleted".into(),
            ));
        }
        db::delete_document(&conn, &id)?;
        document
    };

    if let Err(e) = tokio::fs::remove_file(&document.file_path).await {
        tracing::warn!(document_id = %id, error = %e, "Stored file not removed");
    }
    tracing::info!(document_id = %id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/documents/:id/content`
pub async fn content(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentContent>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let document = db::require_document(&conn, &id)?;
    Ok(Json(DocumentContent {
        id: document.id,
        file_name: document.file_name,
        content: document.content,
        status: document.status,
    }))
}

/// `GET /api/documents/:id/view` — the uploaded bytes as stored.
pub async fn view(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let document = {
        let conn = ctx.core.open_db()?;
        db::require_document(&conn, &id)?
    };

    let bytes = tokio::fs::read(&document.file_path)
        .await
        .map_err(|_| ApiError::NotFound("File not found".into()))?;
    let mime = mime_guess::from_path(&document.file_name)
        .first_or_octet_stream()
        .to_string();

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        }))
}

/// `POST /api/documents/:id/push` — publish tickets to Jira, then GitLab.
pub async fn push(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, ApiError> {
    let id = parse_id(&id)?;
    let (jira_project, gitlab_project) = request.targets()?;

    let report = ctx
        .core
        .publisher()
        .publish(&id, &jira_project, &gitlab_project)
        .await?;

    Ok(Json(PushResponse {
        status: "success",
        message: "Successfully pushed to Jira and GitLab".into(),
        published: report.published,
        skipped: report.skipped,
    }))
}

/// `GET /api/documents/:id/publications` — per-ticket publish checkpoints.
pub async fn publications(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TicketPublication>>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    db::require_document(&conn, &id)?;
    Ok(Json(db::list_publications(&conn, &id)?))
}
