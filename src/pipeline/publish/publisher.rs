use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::lock::DocumentLocks;
use super::tracker::{IssueTracker, NewIssue};
use super::PublishError;
use crate::db::{self, Database, DatabaseError};
use crate::models::enums::{DocumentStatus, PublishState};
use crate::models::{Ticket, TicketPublication};
use crate::pipeline::status::{self, PUBLISHABLE};

/// Summary of a completed publish run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub document_id: Uuid,
    pub total: usize,
    pub published: usize,
    /// Tickets already on both trackers from an earlier run.
    pub skipped: usize,
}

/// Pushes a document's tickets to Jira, then GitLab, one ticket at a time.
///
/// A checkpoint is written after every tracker call, so a failed run can be
/// retried and picks up exactly where it stopped.
#[derive(Clone)]
pub struct Publisher {
    db: Database,
    jira: Arc<dyn IssueTracker>,
    gitlab: Arc<dyn IssueTracker>,
    locks: DocumentLocks,
}

impl Publisher {
    pub fn new(
        db: Database,
        jira: Arc<dyn IssueTracker>,
        gitlab: Arc<dyn IssueTracker>,
        locks: DocumentLocks,
    ) -> Self {
        Self {
            db,
            jira,
            gitlab,
            locks,
        }
    }

    pub fn jira(&self) -> &Arc<dyn IssueTracker> {
        &self.jira
    }

    pub fn gitlab(&self) -> &Arc<dyn IssueTracker> {
        &self.gitlab
    }

    /// True while a publish for this document is in flight.
    pub fn is_publishing(&self, document_id: &Uuid) -> bool {
        self.locks.is_held(document_id)
    }

    pub async fn publish(
        &self,
        document_id: &Uuid,
        jira_project: &str,
        gitlab_project: &str,
    ) -> Result<PublishReport, PublishError> {
        let _guard = self
            .locks
            .try_acquire(*document_id)
            .ok_or_else(|| PublishError::AlreadyRunning(document_id.to_string()))?;

        let span = tracing::info_span!("publish_document", document_id = %document_id);
        self.run(document_id, jira_project, gitlab_project)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        document_id: &Uuid,
        jira_project: &str,
        gitlab_project: &str,
    ) -> Result<PublishReport, PublishError> {
        let (prior, plan) = self.prepare(document_id)?;
        let total = plan.len();
        let mut published = 0;
        let mut skipped = 0;

        tracing::info!(tickets = total, status = %prior, "Starting publish");

        for (ticket, mut publication) in plan {
            if publication.state == PublishState::BothDone {
                skipped += 1;
                continue;
            }

            if let Err(e) = self
                .publish_ticket(&ticket, &mut publication, jira_project, gitlab_project)
                .await
            {
                tracing::warn!(ticket_id = %ticket.id, error = %e, "Publish stopped");
                publication.state = PublishState::Failed;
                publication.error_message = Some(e.to_string());
                if let Err(save_err) = self.checkpoint(&publication) {
                    tracing::error!(error = %save_err, "Could not save publish checkpoint");
                }
                self.fail_document(document_id, prior, &e.to_string());
                return Err(e);
            }
            published += 1;
        }

        if prior != DocumentStatus::Pushed {
            let conn = self.db.open()?;
            status::transition(&conn, document_id, &[prior], DocumentStatus::Pushed, None)?;
        }

        tracing::info!(published, skipped, "Publish complete");
        Ok(PublishReport {
            document_id: *document_id,
            total,
            published,
            skipped,
        })
    }

    /// Check the document may be published and load tickets with their
    /// checkpoints, in position order.
    fn prepare(
        &self,
        document_id: &Uuid,
    ) -> Result<(DocumentStatus, Vec<(Ticket, TicketPublication)>), PublishError> {
        let conn = self.db.open()?;
        let document = db::require_document(&conn, document_id)?;

        if !PUBLISHABLE.contains(&document.status) {
            return Err(DatabaseError::StatusConflict {
                id: document_id.to_string(),
                actual: document.status,
                expected: PUBLISHABLE.to_vec(),
            }
            .into());
        }
        if document.status == DocumentStatus::Failed && !db::has_publications(&conn, document_id)? {
            return Err(PublishError::NotRetryable(document_id.to_string()));
        }

        let tickets = db::list_tickets(&conn, document_id)?;
        let mut plan = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let publication = db::get_publication(&conn, &ticket.id)?
                .unwrap_or_else(|| TicketPublication::not_started(ticket.id));
            plan.push((ticket, publication));
        }
        Ok((document.status, plan))
    }

    async fn publish_ticket(
        &self,
        ticket: &Ticket,
        publication: &mut TicketPublication,
        jira_project: &str,
        gitlab_project: &str,
    ) -> Result<(), PublishError> {
        let jira_key = match publication.jira_key.clone() {
            Some(key) => key,
            None => {
                let issue = NewIssue {
                    title: ticket.title.clone(),
                    description: ticket.description.clone(),
                    labels: Vec::new(),
                };
                let created = self.jira.create_issue(jira_project, &issue).await?;
                publication.jira_key = Some(created.key.clone());
                publication.state = PublishState::TrackerADone;
                publication.error_message = None;
                self.checkpoint(publication)?;
                created.key
            }
        };

        let issue = NewIssue {
            title: ticket.title.clone(),
            description: format!("{}\n\nJira Reference: {}", ticket.description, jira_key),
            labels: vec![ticket.priority.label()],
        };
        let created = self.gitlab.create_issue(gitlab_project, &issue).await?;
        publication.gitlab_iid = created.number;
        publication.state = PublishState::BothDone;
        publication.error_message = None;
        self.checkpoint(publication)?;

        tracing::debug!(ticket_id = %ticket.id, jira_key = %jira_key, "Ticket published");
        Ok(())
    }

    fn checkpoint(&self, publication: &TicketPublication) -> Result<(), PublishError> {
        let conn = self.db.open()?;
        db::save_publication(&conn, publication)?;
        Ok(())
    }

    /// Mark the document FAILED. Logged, never raised: the tracker error is
    /// what the caller needs to see.
    fn fail_document(&self, document_id: &Uuid, prior: DocumentStatus, reason: &str) {
        let outcome = self.db.open().and_then(|conn| {
            if prior == DocumentStatus::Failed {
                // Already failed; refresh the message only.
                db::transition_status(
                    &conn,
                    document_id,
                    &[DocumentStatus::Failed],
                    DocumentStatus::Failed,
                    Some(reason),
                )
            } else {
                status::transition(&conn, document_id, &[prior], DocumentStatus::Failed, Some(reason))
            }
        });
        if let Err(e) = outcome {
            tracing::error!(document_id = %document_id, error = %e, "Could not mark document FAILED");
        }
    }
}
