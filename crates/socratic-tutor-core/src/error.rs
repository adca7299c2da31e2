//! Error kinds surfaced by the retrieval subsystem.

use thiserror::Error;

/// Every failure a [`Retriever`](crate::retriever::Retriever) operation can
/// report. None of them implies partial state: writes either land whole or
/// not at all.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Document content was empty after trimming whitespace.
    #[error("document content must not be empty")]
    EmptyContent,

    /// No document exists with the given id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Chunking parameters are inconsistent (e.g. overlap >= target size).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl RetrievalError {
    /// Whether the error is the caller's fault rather than the backend's.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RetrievalError::Storage(_))
    }
}

/// Convenience alias used across the core crate.
pub type Result<T> = std::result::Result<T, RetrievalError>;
