use std::path::PathBuf;

use thiserror::Error;

/// Errors from watermark persistence.
///
/// An absent backing file is not an error; it reads as empty state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or writing the backing file failed.
    #[error("watermark file i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but does not hold a flat JSON object.
    #[error("watermark file {path} is not a flat JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the in-memory map failed.
    #[error("failed to serialize watermarks: {0}")]
    Serialize(#[source] serde_json::Error),
}
