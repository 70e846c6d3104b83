//! Shared application state for the HTTP layer.
//!
//! `CoreState` owns the database handle and the pipeline engines. It is
//! built once at startup from `ServiceConfig` and wrapped in `Arc`; every
//! handler borrows from it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::db::{self, Database};
use crate::pipeline::derivation::{GenerationError, Generator, OpenAiClient, TicketDeriver};
use crate::pipeline::extraction::{DocumentExtractor, TextExtractor};
use crate::pipeline::processor::DocumentProcessor;
use crate::pipeline::status;
use crate::pipeline::publish::{
    DocumentLocks, GitLabClient, IssueTracker, JiraClient, PublishError, Publisher,
    UnconfiguredTracker,
};

/// Reason recorded on documents whose derivation was cut off by a restart.
pub const INTERRUPTED_MESSAGE: &str = "Ticket generation interrupted by restart";

/// Which external collaborators have credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integrations {
    pub generator: bool,
    pub jira: bool,
    pub gitlab: bool,
}

/// Engines injected into `CoreState`. Production values come from
/// `CoreState::from_config`; tests pass mocks.
pub struct Engines {
    pub generator: Arc<dyn Generator>,
    pub extractor: Arc<dyn TextExtractor + Send + Sync>,
    pub jira: Arc<dyn IssueTracker>,
    pub gitlab: Arc<dyn IssueTracker>,
}

pub struct CoreState {
    db: Database,
    uploads_dir: PathBuf,
    processor: DocumentProcessor,
    publisher: Publisher,
    integrations: Integrations,
}

impl CoreState {
    /// Build the production state: real database, OpenAI client, and
    /// tracker clients for whichever trackers are configured.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, CoreError> {
        let generator = OpenAiClient::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            &config.openai_model,
            config.call_timeout_secs,
        )?;
        if !generator.is_configured() {
            tracing::warn!("OPENAI_API_KEY not set; ticket generation will degrade");
        }

        let jira: Arc<dyn IssueTracker> = match &config.jira {
            Some(jira) => Arc::new(JiraClient::new(
                &jira.url,
                &jira.email,
                &jira.api_token,
                config.call_timeout_secs,
            )?),
            None => {
                tracing::warn!("Jira is not configured");
                Arc::new(UnconfiguredTracker::new("Jira"))
            }
        };

        let gitlab: Arc<dyn IssueTracker> = match &config.gitlab {
            Some(gitlab) => Arc::new(GitLabClient::new(
                &gitlab.url,
                &gitlab.token,
                config.call_timeout_secs,
            )?),
            None => {
                tracing::warn!("GitLab is not configured");
                Arc::new(UnconfiguredTracker::new("GitLab"))
            }
        };

        let integrations = Integrations {
            generator: generator.is_configured(),
            jira: config.jira.is_some(),
            gitlab: config.gitlab.is_some(),
        };

        let engines = Engines {
            generator: Arc::new(generator),
            extractor: Arc::new(DocumentExtractor::default()),
            jira,
            gitlab,
        };

        Self::with_engines(config, engines, integrations)
    }

    /// Build the state around caller-supplied engines. `integrations` is
    /// what `/api/health` reports for them.
    ///
    /// Documents left in PROCESSING by a previous process are moved to
    /// FAILED here, before any derivation can start.
    pub fn with_engines(
        config: &ServiceConfig,
        engines: Engines,
        integrations: Integrations,
    ) -> Result<Self, CoreError> {
        let db = Database::initialize(&config.database_path())?;
        let interrupted = {
            let conn = db.open()?;
            status::fail_interrupted(&conn, INTERRUPTED_MESSAGE)?
        };
        for document_id in &interrupted {
            tracing::warn!(document_id = %document_id, "Interrupted derivation marked FAILED");
        }
        let uploads_dir = config.uploads_dir();
        std::fs::create_dir_all(&uploads_dir).map_err(|e| {
            CoreError::Storage(format!("cannot create {}: {e}", uploads_dir.display()))
        })?;

        let deriver = TicketDeriver::new(
            db.clone(),
            engines.generator,
            Duration::from_secs(config.call_timeout_secs),
        );
        let processor =
            DocumentProcessor::new(db.clone(), uploads_dir.clone(), engines.extractor, deriver);
        let publisher = Publisher::new(
            db.clone(),
            engines.jira,
            engines.gitlab,
            DocumentLocks::new(),
        );

        tracing::info!(
            database = %db.path().display(),
            uploads = %uploads_dir.display(),
            "Core state ready"
        );

        Ok(Self {
            db,
            uploads_dir,
            processor,
            publisher,
            integrations,
        })
    }

    /// Open a connection for a single operation.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(self.db.open()?)
    }

    pub fn uploads_dir(&self) -> &PathBuf {
        &self.uploads_dir
    }

    pub fn processor(&self) -> &DocumentProcessor {
        &self.processor
    }

    pub fn deriver(&self) -> &TicketDeriver {
        self.processor.deriver()
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn integrations(&self) -> Integrations {
        self.integrations
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Generator setup failed: {0}")]
    Generator(#[from] GenerationError),
    #[error("Tracker setup failed: {0}")]
    Tracker(#[from] PublishError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Test fixtures shared by the API tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::pipeline::derivation::MockGenerator;
    use crate::pipeline::publish::MockTracker;

    pub(crate) fn test_config(dir: &std::path::Path) -> ServiceConfig {
        let data_dir = dir.to_string_lossy().to_string();
        ServiceConfig::from_lookup(|key| match key {
            "TICKETFLOW_DATA_DIR" => Some(data_dir.clone()),
            "TICKETFLOW_CALL_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        })
        .unwrap()
    }

    pub(crate) fn test_engines(generator: MockGenerator) -> Engines {
        Engines {
            generator: Arc::new(generator),
            extractor: Arc::new(DocumentExtractor::default()),
            jira: Arc::new(MockTracker::new("Jira", "PROJ-")),
            gitlab: Arc::new(MockTracker::new("GitLab", "#")),
        }
    }

    /// Mocks stand in for every collaborator.
    pub(crate) const MOCKED: Integrations = Integrations {
        generator: true,
        jira: true,
        gitlab: true,
    };

    /// State rooted in a fresh temp dir. Keep the `TempDir` alive for the test.
    pub(crate) fn test_core(engines: Engines) -> (Arc<CoreState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::with_engines(&test_config(dir.path()), engines, MOCKED).unwrap();
        (Arc::new(core), dir)
    }
}
