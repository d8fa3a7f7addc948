//! JSON-file watermark store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::StateError;
use crate::WatermarkStore;

/// Watermark store backed by a single flat JSON object on disk.
///
/// The whole map is rewritten on every `set`, via a temp file renamed
/// over the target so a crash mid-write never leaves a torn file.
/// Callers share the store behind `Arc`, hence the mutex; the sync
/// pipeline itself is single-writer.
pub struct FileWatermarkStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileWatermarkStore {
    /// Open the store at `path`, loading any existing state.
    ///
    /// An absent file yields an empty store; any other read failure,
    /// including unparseable content, is fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No watermark file found, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(StateError::Io { path, source }),
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StateError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(map).map_err(StateError::Serialize)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|source| StateError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let cache = self.cache.lock().expect("watermark cache poisoned");
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &str, marker: &str) -> Result<(), StateError> {
        let mut cache = self.cache.lock().expect("watermark cache poisoned");
        cache.insert(key.to_string(), marker.to_string());
        self.persist(&cache)?;
        debug!(key, marker, "Watermark persisted");
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StateError> {
        let cache = self.cache.lock().expect("watermark cache poisoned");
        Ok(cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
