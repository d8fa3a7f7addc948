use thiserror::Error;

use filmsync_state::StateError;
use filmsync_types::RowError;

use crate::sink::SinkError;
use crate::source::SourceError;

/// Errors surfaced by the pipeline.
///
/// Transient unavailability never reaches this enum: the adapters
/// retry it internally. What does arrive here is fatal to the current
/// batch and propagates to the operator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The change source failed beyond what retry covers.
    #[error("change source error: {0}")]
    Source(#[from] SourceError),

    /// The document sink failed beyond what retry covers.
    #[error("document sink error: {0}")]
    Sink(#[from] SinkError),

    /// Watermark persistence failed.
    #[error("watermark store error: {0}")]
    State(#[from] StateError),

    /// A row came back in a shape assembly cannot work with.
    #[error("row shape error: {0}")]
    Row(#[from] RowError),
}
