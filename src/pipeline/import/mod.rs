pub mod format;
pub mod hash;
pub mod importer;

pub use format::*;
pub use hash::*;
pub use importer::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
