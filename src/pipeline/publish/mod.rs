pub mod tracker;
pub mod jira;
pub mod gitlab;
pub mod lock;
pub mod publisher;

pub use tracker::*;
pub use jira::*;
pub use gitlab::*;
pub use lock::*;
pub use publisher::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{tracker} is not reachable: {reason}")]
    Connection { tracker: String, reason: String },

    #[error("{tracker} returned error (status {status}): {body}")]
    Api {
        tracker: String,
        status: u16,
        body: String,
    },

    #[error("{tracker} response parsing error: {reason}")]
    ResponseParsing { tracker: String, reason: String },

    #[error("A publish is already running for document {0}")]
    AlreadyRunning(String),

    #[error("Document {0} failed before publishing; there is nothing to retry")]
    NotRetryable(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PublishError {
    pub(crate) fn from_reqwest(tracker: &str, e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Connection {
                tracker: tracker.to_string(),
                reason: e.to_string(),
            }
        } else {
            Self::Api {
                tracker: tracker.to_string(),
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                body: e.to_string(),
            }
        }
    }
}
