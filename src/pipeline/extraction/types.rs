use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::import::FormatDetection;

/// Result of text extraction from a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub method: ExtractionMethod,
    pub page_count: usize,
    pub full_text: String,
}

impl ExtractedText {
    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfDirect,
    PlainTextRead,
}

/// PDF text extraction abstraction
pub trait PdfExtractor {
    /// One string per page, in page order.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Main extraction trait (allows mocking for tests)
pub trait TextExtractor {
    fn extract(
        &self,
        bytes: &[u8],
        format: &FormatDetection,
    ) -> Result<ExtractedText, ExtractionError>;
}
