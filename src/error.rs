use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{0} is not allowed to perform this action")]
    Forbidden(Uuid),

    #[error("Discrepancy {id} was already {status}")]
    AlreadyResolved { id: Uuid, status: String },

    #[error("Storage error: {context}")]
    Storage {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(String),
}

impl ReconError {
    pub fn storage(source: std::io::Error, context: impl Into<String>) -> Self {
        ReconError::Storage {
            source,
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
