//! Durable watermark storage.
//!
//! The change tracker records how far it has progressed through each
//! tracked table as a string watermark per tracking key. This crate
//! owns that persistence: a [`WatermarkStore`] trait, a JSON-file
//! implementation for production, and an in-memory one for tests.

pub mod error;
pub mod file;
pub mod memory;

pub use error::StateError;
pub use file::FileWatermarkStore;
pub use memory::MemoryWatermarkStore;

/// Persistent key/marker storage for sync progress.
///
/// `set` must be durable before it returns; the tracker relies on the
/// stored value to resume after a crash. A key that was never set
/// reads back as `None`, which callers map to the epoch watermark.
pub trait WatermarkStore: Send + Sync {
    /// Read the marker for a tracking key, if one was ever stored.
    fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Store a marker for a tracking key, replacing any previous value.
    fn set(&self, key: &str, marker: &str) -> Result<(), StateError>;

    /// All stored `(key, marker)` pairs, sorted by key.
    fn entries(&self) -> Result<Vec<(String, String)>, StateError>;
}
