use super::pdf::PdfTextExtractor;
use super::types::{ExtractedText, ExtractionMethod, PdfExtractor, TextExtractor};
use super::ExtractionError;
use crate::pipeline::import::{FileCategory, FormatDetection};

/// Routes a file to the right extractor by detected category.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
}

impl DocumentExtractor {
    pub fn new(pdf_extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self { pdf_extractor }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor))
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(
        &self,
        bytes: &[u8],
        format: &FormatDetection,
    ) -> Result<ExtractedText, ExtractionError> {
        tracing::info!(
            category = format.category.as_str(),
            size = format.file_size_bytes,
            "Starting text extraction"
        );

        let extracted = match format.category {
            FileCategory::Pdf => {
                let pages = self.pdf_extractor.extract_pages(bytes)?;
                let page_count = pages.len();
                let mut full_text = String::new();
                for page in pages {
                    full_text.push_str(&page);
                    full_text.push('\n');
                }
                ExtractedText {
                    method: ExtractionMethod::PdfDirect,
                    page_count,
                    full_text,
                }
            }
            FileCategory::PlainText => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
                ExtractedText {
                    method: ExtractionMethod::PlainTextRead,
                    page_count: 1,
                    full_text: text,
                }
            }
            FileCategory::Unsupported => return Err(ExtractionError::UnsupportedFormat),
        };

        tracing::info!(
            method = ?extracted.method,
            pages = extracted.page_count,
            text_length = extracted.full_text.len(),
            "Extraction complete"
        );

        Ok(extracted)
    }
}
