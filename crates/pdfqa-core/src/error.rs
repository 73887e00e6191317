use std::time::Duration;

use thiserror::Error;

use crate::types::{Citation, DocumentId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Ingest of document '{document_id}' failed: {reason}")]
    Ingest { document_id: DocumentId, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Index error: {0}")]
    Index(String),

    /// Synthesis failed; `sources` still lists every passage that was retrieved.
    #[error("Answer generation failed: {source}")]
    Generation {
        #[source]
        source: GenerationError,
        sources: Vec<Citation>,
    },

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn ingest(document_id: impl Into<DocumentId>, reason: impl std::fmt::Display) -> Self {
        Self::Ingest { document_id: document_id.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a language-model backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl GenerationError {
    /// Transient failures are worth one more attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Backend(_))
    }
}
