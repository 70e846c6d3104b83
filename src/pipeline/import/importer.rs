use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use super::format::{detect_format, sanitize_filename, FormatDetection};
use super::hash::compute_content_hash;
use super::ImportError;
use crate::db::repository;
use crate::models::Document;

/// Largest upload accepted (25 MB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// What the import step produced.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub document: Document,
    pub format: FormatDetection,
}

/// Store the raw bytes under `uploads_dir` and create the UNPROCESSED
/// document row pointing at them.
pub fn import_upload(
    conn: &Connection,
    uploads_dir: &Path,
    original_name: &str,
    bytes: &[u8],
) -> Result<ImportResult, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ImportError::FileTooLarge {
            size_mb: bytes.len() as f64 / (1024.0 * 1024.0),
            max_mb: (MAX_UPLOAD_BYTES / (1024 * 1024)) as u64,
        });
    }

    let file_name = sanitize_filename(original_name);
    let format = detect_format(&file_name, bytes);
    let hash = compute_content_hash(bytes);

    tracing::info!(
        file = %file_name,
        category = format.category.as_str(),
        size = bytes.len(),
        "Starting document import"
    );

    std::fs::create_dir_all(uploads_dir)?;

    let mut document = Document::new_upload(&file_name, "", Some(hash));
    let stored_path = uploads_dir.join(format!("{}_{}", document.id, file_name));
    std::fs::write(&stored_path, bytes)?;
    document.file_path = stored_path.to_string_lossy().into_owned();

    if let Err(e) = repository::insert_document(conn, &document) {
        // Keep disk and table in step.
        let _ = std::fs::remove_file(&stored_path);
        return Err(e.into());
    }

    tracing::info!(document_id = %document.id, "Document imported");

    Ok(ImportResult { document, format })
}
