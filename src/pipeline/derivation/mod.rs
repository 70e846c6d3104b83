pub mod types;
pub mod prompt;
pub mod parser;
pub mod openai;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use openai::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::db::DatabaseError;

/// Failure of a single call to the text generator.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generator is not reachable at {0}")]
    Connection(String),

    #[error("Generator returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Generator call timed out after {0}s")]
    Timeout(u64),

    #[error("Generator is not configured: {0}")]
    NotConfigured(String),
}

/// Failure of a derivation run as a whole. Generator failures never surface
/// here; they degrade the affected sub-derivation instead.
#[derive(Error, Debug)]
pub enum DerivationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Document {0} has no extracted text")]
    EmptyContent(String),
}
