//! Tracker project listings, used to pick push targets.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::publish::TrackerProject;

/// `GET /api/trackers/jira/projects`
pub async fn jira_projects(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<TrackerProject>>, ApiError> {
    Ok(Json(ctx.core.publisher().jira().list_projects().await?))
}

/// `GET /api/trackers/gitlab/projects` — projects the token is a member of.
pub async fn gitlab_projects(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<TrackerProject>>, ApiError> {
    Ok(Json(ctx.core.publisher().gitlab().list_projects().await?))
}
