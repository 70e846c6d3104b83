//! Document processing: import → extract → derive.
//!
//! Single entry point for uploads. Engines are injected behind traits so
//! the whole flow runs against mocks in tests.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, Database, DatabaseError};
use crate::models::enums::DocumentStatus;
use crate::models::Document;
use crate::pipeline::derivation::{DerivationError, TicketDeriver, EMPTY_CONTENT_MESSAGE};
use crate::pipeline::extraction::{ExtractedText, ExtractionError, TextExtractor};
use crate::pipeline::import::{import_upload, FormatDetection, ImportError};
use crate::pipeline::status;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Derivation failed: {0}")]
    Derivation(#[from] DerivationError),
}

/// When to derive tickets after a successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeriveMode {
    /// Derive before responding.
    #[default]
    Sync,
    /// Claim now, derive on a background task.
    Async,
    /// Extract only.
    None,
}

/// Extraction stage summary.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub method: String,
    pub page_count: usize,
    pub text_length: usize,
}

/// What an upload produced. The document is re-read after the last step.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub document: Document,
    pub message: String,
    pub tickets_count: usize,
    pub extraction: Option<ExtractionSummary>,
}

pub struct DocumentProcessor {
    db: Database,
    uploads_dir: PathBuf,
    extractor: Arc<dyn TextExtractor + Send + Sync>,
    deriver: TicketDeriver,
}

impl DocumentProcessor {
    pub fn new(
        db: Database,
        uploads_dir: PathBuf,
        extractor: Arc<dyn TextExtractor + Send + Sync>,
        deriver: TicketDeriver,
    ) -> Self {
        Self {
            db,
            uploads_dir,
            extractor,
            deriver,
        }
    }

    pub fn deriver(&self) -> &TicketDeriver {
        &self.deriver
    }

    /// Store the file, extract its text, then derive according to `mode`.
    ///
    /// Extraction failures and blank text leave the document in ERROR and
    /// are reported in the outcome, not as an error: the upload itself
    /// succeeded.
    pub async fn process_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mode: DeriveMode,
    ) -> Result<UploadOutcome, ProcessingError> {
        let import = {
            let conn = self.db.open()?;
            import_upload(&conn, &self.uploads_dir, file_name, &bytes)?
        };
        let document_id = import.document.id;

        if !import.format.category.is_supported() {
            tracing::info!(document_id = %document_id, "Unsupported format, stored without extraction");
            return self.outcome(&document_id, "Document uploaded successfully", 0, None);
        }

        let extracted = match self.extract(bytes, import.format).await {
            Ok(extracted) => extracted,
            Err(e) => {
                let message = format!("Upload successful but extraction failed: {e}");
                tracing::warn!(document_id = %document_id, error = %e, "Extraction failed");
                self.mark_error(&document_id, &message)?;
                return self.outcome(&document_id, &message, 0, None);
            }
        };

        let summary = ExtractionSummary {
            method: format!("{:?}", extracted.method),
            page_count: extracted.page_count,
            text_length: extracted.full_text.len(),
        };

        if extracted.is_blank() {
            self.mark_error(&document_id, EMPTY_CONTENT_MESSAGE)?;
            return self.outcome(
                &document_id,
                "Document uploaded but no text content extracted",
                0,
                Some(summary),
            );
        }

        {
            let conn = self.db.open()?;
            db::store_extracted_content(&conn, &document_id, &extracted.full_text)?;
        }

        match mode {
            DeriveMode::None => {
                self.outcome(&document_id, "Content extracted successfully", 0, Some(summary))
            }
            DeriveMode::Async => {
                let document = self.deriver.claim(&document_id)?;
                self.spawn_derivation(document);
                self.outcome(
                    &document_id,
                    "Content extracted; ticket generation started",
                    0,
                    Some(summary),
                )
            }
            DeriveMode::Sync => match self.deriver.derive(&document_id).await {
                Ok(derived) => self.outcome(
                    &document_id,
                    "Content extracted and tickets generated successfully",
                    derived.tickets.len(),
                    Some(summary),
                ),
                Err(e) => {
                    tracing::error!(document_id = %document_id, error = %e, "Ticket generation failed");
                    self.outcome(
                        &document_id,
                        &format!("Content extracted but ticket generation failed: {e}"),
                        0,
                        Some(summary),
                    )
                }
            },
        }
    }

    /// Run the claimed derivation on its own task. A panic in the task
    /// still lands the document in FAILED.
    fn spawn_derivation(&self, document: Document) {
        let deriver = self.deriver.clone();
        tokio::spawn(async move {
            let document_id = document.id;
            let worker = deriver.clone();
            let handle = tokio::spawn(async move { worker.run_claimed(document).await });
            if let Err(join_err) = handle.await {
                deriver.mark_failed(&document_id, &format!("Derivation task aborted: {join_err}"));
            }
        });
    }

    async fn extract(
        &self,
        bytes: Vec<u8>,
        format: FormatDetection,
    ) -> Result<ExtractedText, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&bytes, &format))
            .await
            .map_err(|e| ExtractionError::Aborted(e.to_string()))?
    }

    fn mark_error(&self, document_id: &Uuid, message: &str) -> Result<(), ProcessingError> {
        let conn = self.db.open()?;
        status::transition(
            &conn,
            document_id,
            &[DocumentStatus::Unprocessed],
            DocumentStatus::Error,
            Some(message),
        )?;
        Ok(())
    }

    fn outcome(
        &self,
        document_id: &Uuid,
        message: &str,
        tickets_count: usize,
        extraction: Option<ExtractionSummary>,
    ) -> Result<UploadOutcome, ProcessingError> {
        let conn = self.db.open()?;
        let document = db::require_document(&conn, document_id)?;
        Ok(UploadOutcome {
            document,
            message: message.to_string(),
            tickets_count,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::derivation::{DerivationKind, MockGenerator, MockReply};
    use crate::pipeline::extraction::{DocumentExtractor, ExtractionMethod};

    const LOGIN_RESPONSE: &str = r#"[{"title":"Login page","description":"Build it","priority":"high","estimated_hours":3}]"#;

    struct PanickingExtractor;

    impl TextExtractor for PanickingExtractor {
        fn extract(&self, _bytes: &[u8], _format: &FormatDetection) -> Result<ExtractedText, ExtractionError> {
            panic!("malformed font table");
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, _bytes: &[u8], _format: &FormatDetection) -> Result<ExtractedText, ExtractionError> {
            Err(ExtractionError::PdfParsing("bad xref".into()))
        }
    }

    struct BlankExtractor;

    impl TextExtractor for BlankExtractor {
        fn extract(&self, _bytes: &[u8], _format: &FormatDetection) -> Result<ExtractedText, ExtractionError> {
            Ok(ExtractedText {
                method: ExtractionMethod::PdfDirect,
                page_count: 2,
                full_text: "\n\n".into(),
            })
        }
    }

    fn mock() -> MockGenerator {
        MockGenerator::new()
            .with_text(DerivationKind::Tickets, LOGIN_RESPONSE)
            .with_text(DerivationKind::ScopeSummary, "Login page.")
            .with_text(DerivationKind::ClarifyingQuestions, "Which SSO?")
    }

    fn processor_with(
        extractor: Arc<dyn TextExtractor + Send + Sync>,
        generator: MockGenerator,
    ) -> (tempfile::TempDir, Database, DocumentProcessor) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::initialize(&dir.path().join("ticketflow.db")).unwrap();
        let deriver = TicketDeriver::new(db.clone(), Arc::new(generator), Duration::from_secs(5));
        let processor =
            DocumentProcessor::new(db.clone(), dir.path().join("uploads"), extractor, deriver);
        (dir, db, processor)
    }

    fn processor() -> (tempfile::TempDir, Database, DocumentProcessor) {
        processor_with(Arc::new(DocumentExtractor::default()), mock())
    }

    #[tokio::test]
    async fn sync_upload_derives_tickets() {
        let (_dir, _db, processor) = processor();
        let outcome = processor
            .process_upload("brief.txt", b"Build a login page".to_vec(), DeriveMode::Sync)
            .await
            .unwrap();

        assert_eq!(outcome.document.status, DocumentStatus::Processed);
        assert_eq!(outcome.tickets_count, 1);
        assert_eq!(outcome.document.content.as_deref(), Some("Build a login page"));
        assert_eq!(outcome.extraction.unwrap().method, "PlainTextRead");
    }

    #[tokio::test]
    async fn pdf_upload_extracts_and_derives() {
        let (_dir, _db, processor) = processor();
        let bytes = crate::pipeline::extraction::pdf::tests::make_test_pdf("Build a login page");
        let outcome = processor
            .process_upload("brief.pdf", bytes, DeriveMode::Sync)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Processed);
        assert!(outcome.document.content.unwrap().contains("login"));
    }

    #[tokio::test]
    async fn extract_only_stays_unprocessed() {
        let (_dir, _db, processor) = processor();
        let outcome = processor
            .process_upload("brief.md", b"# Login\nBuild it".to_vec(), DeriveMode::None)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Unprocessed);
        assert!(outcome.document.has_content());
        assert_eq!(outcome.tickets_count, 0);
    }

    #[tokio::test]
    async fn async_upload_returns_processing_then_completes() {
        let generator = mock().with_reply(
            DerivationKind::ScopeSummary,
            MockReply::Delayed(Duration::from_millis(100), "Login page.".into()),
        );
        let (_dir, db, processor) = processor_with(Arc::new(DocumentExtractor::default()), generator);

        let outcome = processor
            .process_upload("brief.txt", b"Build a login page".to_vec(), DeriveMode::Async)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Processing);

        let id = outcome.document.id;
        let mut status = DocumentStatus::Processing;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = db::require_document(&db.open().unwrap(), &id).unwrap().status;
            if status != DocumentStatus::Processing {
                break;
            }
        }
        assert_eq!(status, DocumentStatus::Processed);
        assert_eq!(db::list_tickets(&db.open().unwrap(), &id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_text_marks_error_without_generation() {
        let (_dir, db, processor) = processor_with(Arc::new(BlankExtractor), mock());
        let outcome = processor
            .process_upload("scan.pdf", b"%PDF-1.4 scanned".to_vec(), DeriveMode::Sync)
            .await
            .unwrap();

        assert_eq!(outcome.document.status, DocumentStatus::Error);
        assert_eq!(outcome.document.error_message.as_deref(), Some(EMPTY_CONTENT_MESSAGE));
        assert!(outcome.document.content.is_none());
        assert!(db::list_tickets(&db.open().unwrap(), &outcome.document.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_marks_error() {
        let (_dir, _db, processor) = processor_with(Arc::new(FailingExtractor), mock());
        let outcome = processor
            .process_upload("broken.pdf", b"%PDF-1.4 broken".to_vec(), DeriveMode::Sync)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Error);
        assert!(outcome.message.contains("bad xref"));
    }

    #[tokio::test]
    async fn extractor_panic_is_contained() {
        let (_dir, _db, processor) = processor_with(Arc::new(PanickingExtractor), mock());
        let outcome = processor
            .process_upload("weird.pdf", b"%PDF-1.4 weird".to_vec(), DeriveMode::Sync)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Error);
    }

    #[tokio::test]
    async fn unsupported_format_is_stored_only() {
        let (_dir, _db, processor) = processor();
        let outcome = processor
            .process_upload("photo.png", vec![0x89, 0x50, 0x4E, 0x47], DeriveMode::Sync)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Unprocessed);
        assert!(outcome.extraction.is_none());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (_dir, _db, processor) = processor();
        let result = processor.process_upload("a.txt", Vec::new(), DeriveMode::Sync).await;
        assert!(matches!(result, Err(ProcessingError::Import(ImportError::EmptyFile))));
    }

    #[test]
    fn derive_mode_parses_lowercase() {
        let mode: DeriveMode = serde_json::from_str("\"async\"").unwrap();
        assert_eq!(mode, DeriveMode::Async);
        assert_eq!(DeriveMode::default(), DeriveMode::Sync);
    }
}
