use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PublishError;

/// Issue to create in an external tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
}

/// Reference to an issue created in an external tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRef {
    /// Human-facing key: `PROJ-12` for Jira, `#12` for GitLab.
    pub key: String,
    /// Numeric project-local id where the tracker has one.
    pub number: Option<i64>,
}

/// A selectable project, shaped for a dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerProject {
    pub value: String,
    pub label: String,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    async fn create_issue(&self, project: &str, issue: &NewIssue)
        -> Result<ExternalRef, PublishError>;

    async fn list_projects(&self) -> Result<Vec<TrackerProject>, PublishError>;
}

/// Stand-in for a tracker whose credentials were not provided.
pub struct UnconfiguredTracker {
    name: String,
}

impl UnconfiguredTracker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl IssueTracker for UnconfiguredTracker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_issue(&self, _project: &str, _issue: &NewIssue) -> Result<ExternalRef, PublishError> {
        Err(PublishError::NotConfigured(self.name.clone()))
    }

    async fn list_projects(&self) -> Result<Vec<TrackerProject>, PublishError> {
        Err(PublishError::NotConfigured(self.name.clone()))
    }
}

/// Mock tracker for testing. Issues get sequential numbers; the n-th
/// `create_issue` call (1-based) can be scripted to fail.
pub struct MockTracker {
    name: String,
    key_prefix: String,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    created: Mutex<Vec<(String, NewIssue)>>,
    projects: Vec<TrackerProject>,
}

impl MockTracker {
    pub fn new(name: &str, key_prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            key_prefix: key_prefix.to_string(),
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            projects: Vec::new(),
        }
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn with_projects(mut self, projects: Vec<TrackerProject>) -> Self {
        self.projects = projects;
        self
    }

    /// Issues created so far, with the project they went to.
    pub fn created(&self) -> Vec<(String, NewIssue)> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_issue(&self, project: &str, issue: &NewIssue) -> Result<ExternalRef, PublishError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(PublishError::Api {
                tracker: self.name.clone(),
                status: 500,
                body: format!("scripted failure on call {call}"),
            });
        }

        let mut created = self
            .created
            .lock()
            .map_err(|_| PublishError::Connection {
                tracker: self.name.clone(),
                reason: "mock state poisoned".into(),
            })?;
        created.push((project.to_string(), issue.clone()));
        let number = created.len() as i64;

        Ok(ExternalRef {
            key: format!("{}{}", self.key_prefix, number),
            number: Some(number),
        })
    }

    async fn list_projects(&self) -> Result<Vec<TrackerProject>, PublishError> {
        Ok(self.projects.clone())
    }
}
