//! Port to the relational store holding the normalized dataset.

use async_trait::async_trait;
use thiserror::Error;

use filmsync_retry::Transient;
use filmsync_types::Row;

/// Errors from the change source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The store cannot be reached. Adapters retry this internally.
    #[error("change source unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the query text. Not retryable.
    #[error("query failed: {0}")]
    Query(String),

    /// A result row could not be converted. Not retryable.
    #[error("row decode failed: {0}")]
    Decode(String),
}

impl Transient for SourceError {
    fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Executes rendered query text against the normalized dataset.
///
/// Implementations must return rows in the order the store produced
/// them; the tracker relies on changed-id pages arriving sorted by
/// modification time.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, SourceError>;
}
