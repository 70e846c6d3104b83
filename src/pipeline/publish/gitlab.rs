use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::tracker::{ExternalRef, IssueTracker, NewIssue, TrackerProject};
use super::PublishError;

const TRACKER: &str = "GitLab";
const PER_PAGE: &str = "100";

/// GitLab REST v4 client authenticated with a private token.
pub struct GitLabClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PublishError::from_reqwest(TRACKER, e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PublishError::Unauthorized("Invalid GitLab credentials".into()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                tracker: TRACKER.into(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Project ids may be numeric or a `group/project` path.
fn encode_project_id(project: &str) -> String {
    project.trim().replace('/', "%2F")
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    description: &'a str,
    labels: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
    iid: i64,
}

#[derive(Deserialize)]
struct GitLabProject {
    id: i64,
    path_with_namespace: String,
}

#[async_trait]
impl IssueTracker for GitLabClient {
    fn name(&self) -> &str {
        TRACKER
    }

    async fn create_issue(&self, project: &str, issue: &NewIssue) -> Result<ExternalRef, PublishError> {
        let url = format!(
            "{}/api/v4/projects/{}/issues",
            self.base_url,
            encode_project_id(project)
        );
        let body = CreateIssueRequest {
            title: &issue.title,
            description: &issue.description,
            labels: issue.labels.join(","),
        };

        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::from_reqwest(TRACKER, e))?;

        let created: CreatedIssue = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| PublishError::ResponseParsing {
                tracker: TRACKER.into(),
                reason: e.to_string(),
            })?;

        tracing::info!(iid = created.iid, project, "Created GitLab issue");
        Ok(ExternalRef {
            key: format!("#{}", created.iid),
            number: Some(created.iid),
        })
    }

    async fn list_projects(&self) -> Result<Vec<TrackerProject>, PublishError> {
        let url = format!("{}/api/v4/projects", self.base_url);
        let mut projects = Vec::new();
        let mut page = "1".to_string();

        // GitLab pages listings; `X-Next-Page` is blank on the last page.
        loop {
            let response = self
                .client
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[
                    ("membership", "true"),
                    ("per_page", PER_PAGE),
                    ("page", page.as_str()),
                ])
                .send()
                .await
                .map_err(|e| PublishError::from_reqwest(TRACKER, e))?;

            let response = self.check(response).await?;
            let next = next_page(response.headers());
            let batch: Vec<GitLabProject> =
                response
                    .json()
                    .await
                    .map_err(|e| PublishError::ResponseParsing {
                        tracker: TRACKER.into(),
                        reason: e.to_string(),
                    })?;
            projects.extend(batch.into_iter().map(|p| TrackerProject {
                value: p.id.to_string(),
                label: p.path_with_namespace,
            }));

            match next {
                Some(next) if next != page => page = next,
                _ => break,
            }
        }

        tracing::debug!(count = projects.len(), "Listed GitLab projects");
        Ok(projects)
    }
}

fn next_page(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
