use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::tracker::{ExternalRef, IssueTracker, NewIssue, TrackerProject};
use super::PublishError;

const TRACKER: &str = "Jira";
const ISSUE_TYPE: &str = "Task";

/// Jira REST v2 client with basic auth (email + API token).
pub struct JiraClient {
    base_url: String,
    email: String,
    api_token: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        email: &str,
        api_token: &str,
        timeout_secs: u64,
    ) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PublishError::from_reqwest(TRACKER, e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
            client,
        })
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PublishError::Unauthorized("Invalid Jira credentials".into()));
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

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    fields: IssueFields<'a>,
}

#[derive(Serialize)]
struct IssueFields<'a> {
    project: ProjectKey<'a>,
    summary: &'a str,
    description: &'a str,
    issuetype: IssueType<'a>,
}

#[derive(Serialize)]
struct ProjectKey<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct IssueType<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Deserialize)]
struct JiraProject {
    key: String,
    name: String,
}

fn create_body<'a>(project: &'a str, issue: &'a NewIssue) -> CreateIssueRequest<'a> {
    CreateIssueRequest {
        fields: IssueFields {
            project: ProjectKey { key: project },
            summary: &issue.title,
            description: &issue.description,
            issuetype: IssueType { name: ISSUE_TYPE },
        },
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    fn name(&self) -> &str {
        TRACKER
    }

    async fn create_issue(&self, project: &str, issue: &NewIssue) -> Result<ExternalRef, PublishError> {
        let url = format!("{}/rest/api/2/issue", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&create_body(project, issue))
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

        tracing::info!(key = %created.key, project, "Created Jira issue");
        Ok(ExternalRef {
            key: created.key,
            number: None,
        })
    }

    async fn list_projects(&self) -> Result<Vec<TrackerProject>, PublishError> {
        let url = format!("{}/rest/api/2/project", self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .send()
            .await
            .map_err(|e| PublishError::from_reqwest(TRACKER, e))?;

        let projects: Vec<JiraProject> = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| PublishError::ResponseParsing {
                tracker: TRACKER.into(),
                reason: e.to_string(),
            })?;

        Ok(projects
            .into_iter()
            .map(|p| TrackerProject {
                value: p.key,
                label: p.name,
            })
            .collect())
    }
}
