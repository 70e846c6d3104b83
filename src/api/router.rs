//! HTTP API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Layers (outermost → innermost): CORS → access log → handler.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::pipeline::import::MAX_UPLOAD_BYTES;

/// Multipart framing on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Build the API router over shared state.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/documents", get(endpoints::documents::list))
        .route(
            "/documents/upload",
            post(endpoints::documents::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/documents/:id",
            get(endpoints::documents::detail).delete(endpoints::documents::delete),
        )
        .route("/documents/:id/content", get(endpoints::documents::content))
        .route("/documents/:id/view", get(endpoints::documents::view))
        .route("/documents/:id/push", post(endpoints::documents::push))
        .route("/documents/:id/push-to-jira", post(endpoints::documents::push))
        .route(
            "/documents/:id/publications",
            get(endpoints::documents::publications),
        )
        .route(
            "/tickets/generate/:document_id",
            post(endpoints::tickets::generate),
        )
        .route(
            "/tickets/item/:ticket_id",
            patch(endpoints::tickets::update_status),
        )
        .route("/tickets/:document_id", get(endpoints::tickets::list))
        .route(
            "/trackers/jira/projects",
            get(endpoints::trackers::jira_projects),
        )
        .route(
            "/trackers/gitlab/projects",
            get(endpoints::trackers::gitlab_projects),
        )
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::core_state::testing::{test_core, test_engines};
    use crate::core_state::Engines;
    use crate::pipeline::derivation::{DerivationKind, MockGenerator};
    use crate::pipeline::publish::{MockTracker, TrackerProject};

    const BOUNDARY: &str = "ticketflow-test-boundary";
    const LOGIN_RESPONSE: &str = r#"```json
[{"title": "Login page", "description": "Email and password form", "priority": "high", "estimated_hours": 3}]
```"#;

    fn generator() -> MockGenerator {
        MockGenerator::new()
            .with_text(DerivationKind::Tickets, LOGIN_RESPONSE)
            .with_text(DerivationKind::ScopeSummary, "A login page.")
            .with_text(DerivationKind::ClarifyingQuestions, "Is SSO required?")
    }

    fn app_with(engines: Engines) -> (Router, Arc<CoreState>, tempfile::TempDir) {
        let (core, dir) = test_core(engines);
        (api_router(core.clone()), core, dir)
    }

    fn app() -> (Router, Arc<CoreState>, tempfile::TempDir) {
        app_with(test_engines(generator()))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_req(field: &str, file_name: &str, content: &str, mode: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(format!("/api/documents/upload?derive={mode}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn upload(app: &Router, mode: &str) -> (StatusCode, Value) {
        send(
            app,
            upload_req("file", "requirements.txt", "Users need a login page.", mode),
        )
        .await
    }

    fn push_body() -> Value {
        serde_json::json!({"project_key": "PROJ", "gitlab_project_id": 7})
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _core, _dir) = app();
        let (status, json) = send(&app, get_req("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn upload_derives_tickets_synchronously() {
        let (app, _core, _dir) = app();
        let (status, json) = upload(&app, "sync").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "PROCESSED");
        assert_eq!(json["tickets_count"], 1);
        assert_eq!(json["content_preview"], "Users need a login page.");
        assert_eq!(
            json["message"],
            "Content extracted and tickets generated successfully"
        );

        let id = json["id"].as_str().unwrap();
        let (status, detail) = send(&app, get_req(&format!("/api/documents/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["scope_summary"], "A login page.");
        assert_eq!(detail["clarifying_questions"], "Is SSO required?");
        let tickets = detail["tickets"].as_array().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0]["priority"], "HIGH");
        assert_eq!(tickets[0]["estimated_hours"], 3.0);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let (app, _core, _dir) = app();
        let (status, json) =
            send(&app, upload_req("attachment", "a.txt", "text", "sync")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "No file provided");
    }

    #[tokio::test]
    async fn extract_only_then_generate() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "none").await;
        assert_eq!(json["status"], "UNPROCESSED");
        assert_eq!(json["tickets_count"], 0);
        let id = json["id"].as_str().unwrap().to_string();

        let (status, generated) = send(
            &app,
            json_req("POST", &format!("/api/tickets/generate/{id}"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["message"], "Generated 1 tickets");
        assert_eq!(generated["tickets"][0]["title"], "Login page");

        let (_, tickets) = send(&app, get_req(&format!("/api/tickets/{id}"))).await;
        assert_eq!(tickets.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_generate_is_conflict() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            json_req("POST", &format!("/api/tickets/generate/{id}"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let (app, _core, _dir) = app();
        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, get_req(&format!("/api/documents/{missing}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get_req("/api/documents/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_and_content() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "none").await;
        let id = json["id"].as_str().unwrap();

        let (status, list) = send(&app, get_req("/api/documents")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["id"], id);
        assert_eq!(list[0]["file_name"], "requirements.txt");

        let (_, content) = send(&app, get_req(&format!("/api/documents/{id}/content"))).await;
        assert_eq!(content["content"], "Users need a login page.");
        assert_eq!(content["status"], "UNPROCESSED");
    }

    #[tokio::test]
    async fn view_returns_raw_bytes() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "none").await;
        let id = json["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(get_req(&format!("/api/documents/{id}/view")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Users need a login page.");
    }

    #[tokio::test]
    async fn push_publishes_and_records_checkpoints() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            json_req("POST", &format!("/api/documents/{id}/push"), push_body()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Successfully pushed to Jira and GitLab");
        assert_eq!(body["published"], 1);

        let (_, publications) =
            send(&app, get_req(&format!("/api/documents/{id}/publications"))).await;
        assert_eq!(publications[0]["state"], "BOTH_DONE");
        assert_eq!(publications[0]["jira_key"], "PROJ-1");

        let (_, detail) = send(&app, get_req(&format!("/api/documents/{id}"))).await;
        assert_eq!(detail["status"], "PUSHED");
    }

    #[tokio::test]
    async fn push_requires_targets() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            json_req(
                "POST",
                &format!("/api/documents/{id}/push"),
                serde_json::json!({"project_key": "PROJ"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn push_failure_surfaces_message_and_fails_document() {
        let engines = Engines {
            gitlab: Arc::new(MockTracker::new("GitLab", "#").failing_on_call(1)),
            ..test_engines(generator())
        };
        let (app, _core, _dir) = app_with(engines);
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            json_req("POST", &format!("/api/documents/{id}/push"), push_body()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("scripted failure"));

        let (_, detail) = send(&app, get_req(&format!("/api/documents/{id}"))).await;
        assert_eq!(detail["status"], "FAILED");
        let (_, publications) =
            send(&app, get_req(&format!("/api/documents/{id}/publications"))).await;
        assert_eq!(publications[0]["state"], "FAILED");
        assert_eq!(publications[0]["jira_key"], "PROJ-1");
    }

    #[tokio::test]
    async fn push_before_derivation_is_conflict() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "none").await;
        let id = json["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            json_req("POST", &format!("/api/documents/{id}/push"), push_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn ticket_status_update() {
        let (app, _core, _dir) = app();
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();
        let (_, tickets) = send(&app, get_req(&format!("/api/tickets/{id}"))).await;
        let ticket_id = tickets[0]["id"].as_str().unwrap();

        let (status, ticket) = send(
            &app,
            json_req(
                "PATCH",
                &format!("/api/tickets/item/{ticket_id}"),
                serde_json::json!({"status": "IN_PROGRESS"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ticket["status"], "IN_PROGRESS");

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(
            &app,
            json_req(
                "PATCH",
                &format!("/api/tickets/item/{missing}"),
                serde_json::json!({"status": "COMPLETED"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_document_and_file() {
        let (app, core, _dir) = app();
        let (_, json) = upload(&app, "sync").await;
        let id = json["id"].as_str().unwrap();

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/documents/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, get_req(&format!("/api/documents/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(std::fs::read_dir(core.uploads_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn tracker_project_listings() {
        let projects = vec![TrackerProject {
            value: "7".into(),
            label: "acme/web".into(),
        }];
        let engines = Engines {
            gitlab: Arc::new(MockTracker::new("GitLab", "#").with_projects(projects)),
            ..test_engines(generator())
        };
        let (app, _core, _dir) = app_with(engines);

        let (status, json) = send(&app, get_req("/api/trackers/gitlab/projects")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["value"], "7");
        assert_eq!(json[0]["label"], "acme/web");

        let (status, json) = send(&app, get_req("/api/trackers/jira/projects")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 0);
    }
}
