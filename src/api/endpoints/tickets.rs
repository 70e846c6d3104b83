//! Ticket endpoints: generate, list, update status.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, GenerateResponse, UpdateTicketRequest};
use crate::db;
use crate::models::Ticket;

/// `POST /api/tickets/generate/:document_id` — derive tickets now.
///
/// Only an UNPROCESSED document can be derived; anything else is a 409.
pub async fn generate(
    State(ctx): State<ApiContext>,
    Path(document_id): Path<String>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let document_id = parse_id(&document_id)?;
    let outcome = ctx.core.deriver().derive(&document_id).await?;

    if let Some(reason) = &outcome.tickets_degraded {
        tracing::warn!(document_id = %document_id, reason = %reason, "Tickets degraded to empty list");
    }

    Ok(Json(GenerateResponse {
        message: format!("Generated {} tickets", outcome.tickets.len()),
        tickets: outcome.tickets,
        scope_summary: outcome.scope_summary,
        clarifying_questions: outcome.clarifying_questions,
    }))
}

/// `GET /api/tickets/:document_id`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let document_id = parse_id(&document_id)?;
    let conn = ctx.core.open_db()?;
    db::require_document(&conn, &document_id)?;
    Ok(Json(db::list_tickets(&conn, &document_id)?))
}

/// `PATCH /api/tickets/item/:ticket_id` — body `{"status": "IN_PROGRESS"}`.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Path(ticket_id): Path<String>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket_id = parse_id(&ticket_id)?;
    let conn = ctx.core.open_db()?;
    let ticket = db::update_ticket_status(&conn, &ticket_id, request.status)?;
    tracing::info!(ticket_id = %ticket_id, status = %ticket.status, "Ticket status updated");
    Ok(Json(ticket))
}
