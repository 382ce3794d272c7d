use thiserror::Error;

use crate::types::QueryId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot build an index over an empty corpus")]
    EmptyCorpus,

    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Query not found: {0}")]
    QueryNotFound(String),

    #[error("Encoder failure: {0}")]
    Encoder(String),

    #[error("Query {0} has an empty answer set")]
    EmptyAnswers(QueryId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures raised by the external encoder collaborator.
    pub fn is_encoder_failure(&self) -> bool {
        matches!(self, Error::Encoder(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Rejects `k == 0` with the same message everywhere.
pub fn ensure_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidArgument("k must be greater than zero".to_string()));
    }
    Ok(())
}
