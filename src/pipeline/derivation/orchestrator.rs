use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::parser::parse_ticket_response;
use super::prompt::{
    build_prompt, system_prompt, CLARIFYING_QUESTIONS_FALLBACK, SCOPE_SUMMARY_FALLBACK,
};
use super::types::{DerivationKind, Derived, Generator};
use super::{DerivationError, GenerationError};
use crate::db::{self, Database};
use crate::models::enums::DocumentStatus;
use crate::models::{Document, Ticket};
use crate::pipeline::status;

pub const EMPTY_CONTENT_MESSAGE: &str = "No text content extracted from document";

/// Everything one derivation run persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DerivationOutcome {
    pub document_id: Uuid,
    pub tickets: Vec<Ticket>,
    #[serde(skip)]
    pub tickets_degraded: Option<String>,
    pub scope_summary: String,
    pub clarifying_questions: String,
}

/// Drives tickets, scope summary and clarifying questions for one document
/// and owns every status write of the derivation path.
#[derive(Clone)]
pub struct TicketDeriver {
    db: Database,
    generator: Arc<dyn Generator>,
    call_timeout: Duration,
}

impl TicketDeriver {
    pub fn new(db: Database, generator: Arc<dyn Generator>, call_timeout: Duration) -> Self {
        Self {
            db,
            generator,
            call_timeout,
        }
    }

    /// Claim and derive in one go.
    pub async fn derive(&self, document_id: &Uuid) -> Result<DerivationOutcome, DerivationError> {
        let document = self.claim(document_id)?;
        self.run_claimed(document).await
    }

    /// Take the UNPROCESSED → PROCESSING claim.
    ///
    /// A document without text goes straight to ERROR instead. A document in
    /// any other status yields `StatusConflict`, which is how repeated or
    /// concurrent derivation requests are turned away.
    pub fn claim(&self, document_id: &Uuid) -> Result<Document, DerivationError> {
        let conn = self.db.open()?;
        let mut document = db::require_document(&conn, document_id)?;

        if !document.has_content() {
            status::transition(
                &conn,
                document_id,
                &[DocumentStatus::Unprocessed],
                DocumentStatus::Error,
                Some(EMPTY_CONTENT_MESSAGE),
            )?;
            tracing::warn!(document_id = %document_id, "Document has no text, marked ERROR");
            return Err(DerivationError::EmptyContent(document_id.to_string()));
        }

        status::transition(
            &conn,
            document_id,
            &[DocumentStatus::Unprocessed],
            DocumentStatus::Processing,
            None,
        )?;
        document.status = DocumentStatus::Processing;
        tracing::info!(document_id = %document_id, "Derivation claimed");
        Ok(document)
    }

    /// Run the generator calls for a document already in PROCESSING and
    /// commit the result. Any error here leaves the document FAILED.
    pub async fn run_claimed(&self, document: Document) -> Result<DerivationOutcome, DerivationError> {
        let document_id = document.id;
        let span = tracing::info_span!("derive_document", document_id = %document_id);

        let result = self.derive_and_commit(document).instrument(span).await;
        if let Err(e) = &result {
            self.mark_failed(&document_id, &e.to_string());
        }
        result
    }

    /// PROCESSING → FAILED with the given reason. Logged, never raised.
    pub fn mark_failed(&self, document_id: &Uuid, reason: &str) {
        let outcome = self.db.open().and_then(|conn| {
            status::transition(
                &conn,
                document_id,
                &[DocumentStatus::Processing],
                DocumentStatus::Failed,
                Some(reason),
            )
        });
        match outcome {
            Ok(()) => tracing::error!(document_id = %document_id, error = %reason, "Derivation failed"),
            Err(e) => tracing::error!(
                document_id = %document_id,
                error = %e,
                "Could not record derivation failure"
            ),
        }
    }

    async fn derive_and_commit(&self, document: Document) -> Result<DerivationOutcome, DerivationError> {
        let content = document.content.unwrap_or_default();

        let (tickets_raw, summary, questions) = tokio::join!(
            self.call(DerivationKind::Tickets, &content),
            self.call(DerivationKind::ScopeSummary, &content),
            self.call(DerivationKind::ClarifyingQuestions, &content),
        );

        let tickets = match tickets_raw {
            Ok(text) => Derived::Ok(parse_ticket_response(&text)),
            Err(e) => Derived::Degraded {
                fallback: Vec::new(),
                reason: e.to_string(),
            },
        };
        let summary = with_fallback(summary, SCOPE_SUMMARY_FALLBACK);
        let questions = with_fallback(questions, CLARIFYING_QUESTIONS_FALLBACK);

        for (kind, reason) in [
            (DerivationKind::Tickets, tickets.reason()),
            (DerivationKind::ScopeSummary, summary.reason()),
            (DerivationKind::ClarifyingQuestions, questions.reason()),
        ] {
            if let Some(reason) = reason {
                tracing::warn!(kind = kind.as_str(), reason, "Sub-derivation degraded");
            }
        }

        let tickets_degraded = tickets.reason().map(str::to_string);
        let tickets: Vec<Ticket> = tickets
            .into_value()
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_ticket(document.id, i as u32))
            .collect();
        let scope_summary = summary.into_value();
        let clarifying_questions = questions.into_value();

        {
            let conn = self.db.open()?;
            db::commit_derivation(
                &conn,
                &document.id,
                &tickets,
                &scope_summary,
                &clarifying_questions,
            )?;
        }

        tracing::info!(tickets = tickets.len(), "Derivation committed");

        Ok(DerivationOutcome {
            document_id: document.id,
            tickets,
            tickets_degraded,
            scope_summary,
            clarifying_questions,
        })
    }

    async fn call(&self, kind: DerivationKind, content: &str) -> Result<String, GenerationError> {
        let prompt = build_prompt(kind, content);
        match tokio::time::timeout(
            self.call_timeout,
            self.generator.generate(kind, &prompt, system_prompt(kind)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.call_timeout.as_secs())),
        }
    }
}

fn with_fallback(result: Result<String, GenerationError>, fallback: &str) -> Derived<String> {
    match result {
        Ok(text) => Derived::Ok(text),
        Err(e) => Derived::Degraded {
            fallback: fallback.to_string(),
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;
    use crate::models::enums::TicketPriority;
    use crate::pipeline::derivation::openai::{MockGenerator, MockReply};

    const LOGIN_RESPONSE: &str = r#"[{"title":"Login page","description":"Build it","priority":"high","estimated_hours":3}]"#;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::initialize(&dir.path().join("ticketflow.db")).unwrap();
        (dir, db)
    }

    fn seed(db: &Database, content: Option<&str>) -> Uuid {
        let conn = db.open().unwrap();
        let doc = Document::new_upload("brief.txt", "/tmp/brief.txt", None);
        db::insert_document(&conn, &doc).unwrap();
        if let Some(text) = content {
            db::store_extracted_content(&conn, &doc.id, text).unwrap();
        }
        doc.id
    }

    fn full_mock() -> MockGenerator {
        MockGenerator::new()
            .with_text(DerivationKind::Tickets, LOGIN_RESPONSE)
            .with_text(DerivationKind::ScopeSummary, "A login page.")
            .with_text(DerivationKind::ClarifyingQuestions, "Which SSO provider?")
    }

    fn deriver(db: &Database, mock: Arc<MockGenerator>) -> TicketDeriver {
        TicketDeriver::new(db.clone(), mock, Duration::from_secs(5))
    }

    fn stored(db: &Database, id: &Uuid) -> Document {
        db::require_document(&db.open().unwrap(), id).unwrap()
    }

    #[tokio::test]
    async fn login_page_scenario() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let outcome = deriver(&db, Arc::new(full_mock())).derive(&id).await.unwrap();

        assert_eq!(outcome.tickets.len(), 1);
        assert_eq!(outcome.tickets[0].priority, TicketPriority::High);
        assert_eq!(outcome.tickets[0].estimated_hours, Some(3.0));

        let doc = stored(&db, &id);
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.scope_summary.as_deref(), Some("A login page."));
        assert_eq!(doc.clarifying_questions.as_deref(), Some("Which SSO provider?"));

        let tickets = db::list_tickets(&db.open().unwrap(), &id).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].title, "Login page");
    }

    #[tokio::test]
    async fn refusal_still_processed_with_no_tickets() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Something vague"));
        let mock = full_mock().with_text(DerivationKind::Tickets, "Sorry, I cannot help with that.");
        let outcome = deriver(&db, Arc::new(mock)).derive(&id).await.unwrap();

        assert!(outcome.tickets.is_empty());
        assert!(outcome.tickets_degraded.is_none());
        assert_eq!(stored(&db, &id).status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn empty_content_goes_to_error_without_calls() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("   \n  "));
        let mock = Arc::new(full_mock());
        let result = deriver(&db, mock.clone()).derive(&id).await;

        assert!(matches!(result, Err(DerivationError::EmptyContent(_))));
        assert_eq!(mock.calls(), 0);
        let doc = stored(&db, &id);
        assert_eq!(doc.status, DocumentStatus::Error);
        assert_eq!(doc.error_message.as_deref(), Some(EMPTY_CONTENT_MESSAGE));
        assert!(db::list_tickets(&db.open().unwrap(), &id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_goes_to_error() {
        let (_dir, db) = test_db();
        let id = seed(&db, None);
        let result = deriver(&db, Arc::new(full_mock())).derive(&id).await;
        assert!(matches!(result, Err(DerivationError::EmptyContent(_))));
        assert_eq!(stored(&db, &id).status, DocumentStatus::Error);
    }

    #[tokio::test]
    async fn summary_failure_uses_fallback() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let mock = full_mock()
            .with_reply(DerivationKind::ScopeSummary, MockReply::Fail("boom".into()));
        let outcome = deriver(&db, Arc::new(mock)).derive(&id).await.unwrap();

        assert_eq!(outcome.scope_summary, SCOPE_SUMMARY_FALLBACK);
        assert_eq!(outcome.tickets.len(), 1);
        let doc = stored(&db, &id);
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.scope_summary.as_deref(), Some(SCOPE_SUMMARY_FALLBACK));
    }

    #[tokio::test]
    async fn ticket_generation_failure_degrades_to_empty() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let mock = full_mock().with_reply(DerivationKind::Tickets, MockReply::Fail("503".into()));
        let outcome = deriver(&db, Arc::new(mock)).derive(&id).await.unwrap();

        assert!(outcome.tickets.is_empty());
        assert!(outcome.tickets_degraded.is_some());
        assert_eq!(stored(&db, &id).status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn timeout_counts_as_generation_failure() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let mock = full_mock().with_reply(
            DerivationKind::ClarifyingQuestions,
            MockReply::Delayed(Duration::from_secs(10), "late".into()),
        );
        let deriver = TicketDeriver::new(db.clone(), Arc::new(mock), Duration::from_millis(50));
        let outcome = deriver.derive(&id).await.unwrap();

        assert_eq!(outcome.clarifying_questions, CLARIFYING_QUESTIONS_FALLBACK);
        assert_eq!(stored(&db, &id).status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn second_derivation_is_rejected() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let deriver = deriver(&db, Arc::new(full_mock()));
        deriver.derive(&id).await.unwrap();

        let again = deriver.derive(&id).await;
        assert!(matches!(
            again,
            Err(DerivationError::Database(DatabaseError::StatusConflict { .. }))
        ));
        assert_eq!(db::list_tickets(&db.open().unwrap(), &id).unwrap().len(), 1);
        assert_eq!(stored(&db, &id).status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn claim_blocks_a_concurrent_run() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let deriver = deriver(&db, Arc::new(full_mock()));

        let claimed = deriver.claim(&id).unwrap();
        assert!(matches!(
            deriver.claim(&id),
            Err(DerivationError::Database(DatabaseError::StatusConflict { .. }))
        ));

        deriver.run_claimed(claimed).await.unwrap();
        assert_eq!(stored(&db, &id).status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn commit_failure_marks_failed() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("Build a login page"));
        let deriver = deriver(&db, Arc::new(full_mock()));
        let claimed = deriver.claim(&id).unwrap();

        // Someone else finished the document in the meantime.
        db::transition_status(
            &db.open().unwrap(),
            &id,
            &[DocumentStatus::Processing],
            DocumentStatus::Failed,
            Some("externally failed"),
        )
        .unwrap();

        assert!(deriver.run_claimed(claimed).await.is_err());
        assert!(db::list_tickets(&db.open().unwrap(), &id).unwrap().is_empty());
        assert_eq!(stored(&db, &id).status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn mark_failed_records_reason() {
        let (_dir, db) = test_db();
        let id = seed(&db, Some("text"));
        let deriver = deriver(&db, Arc::new(full_mock()));
        deriver.claim(&id).unwrap();
        deriver.mark_failed(&id, "worker crashed");

        let doc = stored(&db, &id);
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error_message.as_deref(), Some("worker crashed"));
    }
}
