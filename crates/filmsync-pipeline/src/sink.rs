//! Port to the search engine receiving assembled documents.

use async_trait::async_trait;
use thiserror::Error;

use filmsync_retry::Transient;
use filmsync_types::Document;

/// Errors from the document sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The engine cannot be reached. Adapters retry this internally.
    #[error("document sink unavailable: {0}")]
    Unavailable(String),

    /// The engine refused part or all of the batch. Not retryable.
    #[error("sink rejected documents: {0}")]
    Rejected(String),
}

impl Transient for SinkError {
    fn is_transient(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

/// Writes assembled documents into their destination indexes.
///
/// Upserts are keyed by `(index, id)`, so re-sending a batch after a
/// crash replaces documents instead of duplicating them. An empty
/// batch must be a no-op.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<(), SinkError>;
}
