//! Error taxonomy shared across the workspace.
//!
//! Ingestion errors propagate typed to the caller; query-path errors are
//! caught at the orchestrator boundary and replaced by a fixed fallback
//! answer, after being logged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Malformed or unreadable source document.
    #[error("failed to load source document: {0}")]
    Load(String),

    /// Source parsed but yielded zero chunks.
    #[error("source yielded no extractable text")]
    EmptyContent,

    /// Embedding service failure: auth, rate limit, or timeout.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// Vector store transport or protocol failure.
    #[error("vector store error: {0}")]
    Store(String),

    /// Bind attempted against a collection that does not exist.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Embedding dimensionality does not match the collection's vector size.
    #[error("embedding dimension {got} does not match collection vector size {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    /// Language-model call failed after bounded retry.
    #[error("generation error: {0}")]
    Generation(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Usage log or active-collection pointer storage failure.
    #[error("chat store error: {0}")]
    ChatStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
