//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub generator_configured: bool,
    pub jira_configured: bool,
    pub gitlab_configured: bool,
}

/// `GET /api/health` — liveness plus which integrations have credentials.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    // Touch the database so a broken data dir shows up here.
    ctx.core.open_db()?;
    let integrations = ctx.core.integrations();

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        generator_configured: integrations.generator,
        jira_configured: integrations.jira,
        gitlab_configured: integrations.gitlab,
    }))
}
