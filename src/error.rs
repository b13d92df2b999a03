//! Crate error type

use thiserror::Error;

/// Failures that cannot be absorbed into a diagnostics summary
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ingest config: {0}")]
    Config(#[source] serde_json::Error),

    #[error("failed to decode EPG document: {0}")]
    Decode(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
