// Waggle Ingest Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Missing metadata for {entry} (expected {expected})")]
    MissingMetadata { entry: String, expected: String },

    #[error("Malformed metadata in {entry}: {reason}")]
    MalformedMetadata { entry: String, reason: String },

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        IngestError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
