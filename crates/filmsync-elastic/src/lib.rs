//! Elasticsearch-compatible implementation of the `DocumentSink` port.
//!
//! Documents travel as NDJSON `_bulk` requests, one action line and
//! one source line per document, routed by each document's index.
//! Startup creates the destination indexes from a directory of JSON
//! mapping files, treating "already exists" as success. Reachability
//! failures are retried with exponential backoff.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use filmsync_pipeline::{DocumentSink, SinkError};
use filmsync_retry::{retry_transient, RetryPolicy, Transient};
use filmsync_types::settings::SearchSettings;
use filmsync_types::{ConfigError, Document, IndexName};

/// Errors from sink construction and index bootstrap.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// The engine cannot be reached. Retried during bootstrap.
    #[error("search engine unreachable: {0}")]
    Unreachable(String),

    /// The HTTP client could not be built.
    #[error("http client construction failed: {0}")]
    Client(#[source] reqwest::Error),

    /// A mapping file could not be read.
    #[error("mapping file i/o failed at {path}: {source}")]
    MappingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mapping file holds invalid JSON.
    #[error("mapping file {path} is not valid JSON: {source}")]
    MappingParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A mapping file is named after no known index.
    #[error(transparent)]
    Index(#[from] ConfigError),

    /// The engine refused to create an index.
    #[error("index creation refused: {0}")]
    Refused(String),
}

impl Transient for ElasticError {
    fn is_transient(&self) -> bool {
        matches!(self, ElasticError::Unreachable(_))
    }
}

/// Document sink talking to an Elasticsearch-compatible HTTP API.
pub struct ElasticSink {
    client: Client,
    base_url: String,
    index_dir: PathBuf,
    retry: RetryPolicy,
}

impl ElasticSink {
    pub fn new(settings: &SearchSettings) -> Result<Self, ElasticError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ElasticError::Client)?;
        Ok(Self {
            client,
            base_url: settings.base_url(),
            index_dir: settings.index_dir.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create every index that has a `<index>.json` mapping file in the
    /// configured directory. A file named after no known index fails
    /// fast before anything touches the engine.
    pub async fn bootstrap_indexes(&self) -> Result<(), ElasticError> {
        let entries = fs::read_dir(&self.index_dir).map_err(|source| ElasticError::MappingIo {
            path: self.index_dir.clone(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| ElasticError::MappingIo {
                    path: self.index_dir.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            let index: IndexName = stem.parse()?;

            let raw = fs::read_to_string(&path).map_err(|source| ElasticError::MappingIo {
                path: path.clone(),
                source,
            })?;
            let mapping: Value =
                serde_json::from_str(&raw).map_err(|source| ElasticError::MappingParse {
                    path: path.clone(),
                    source,
                })?;

            self.create_index(index, &mapping).await?;
        }
        Ok(())
    }

    async fn create_index(&self, index: IndexName, mapping: &Value) -> Result<(), ElasticError> {
        let url = format!("{}/{}", self.base_url, index);
        retry_transient(&self.retry, "index create", || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .put(&url)
                    .json(mapping)
                    .send()
                    .await
                    .map_err(|err| ElasticError::Unreachable(err.to_string()))?;

                // The engine answers 400 when the index already exists.
                if response.status() == StatusCode::BAD_REQUEST {
                    debug!(index = %index, "Index already exists");
                    return Ok(());
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ElasticError::Refused(format!("HTTP {status}: {body}")));
                }
                info!(index = %index, "Index created");
                Ok(())
            }
        })
        .await
    }
}

#[async_trait]
impl DocumentSink for ElasticSink {
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<(), SinkError> {
        if documents.is_empty() {
            return Ok(());
        }
        let body = render_bulk_body(documents)?;
        let url = format!("{}/_bulk", self.base_url);

        let response_body = retry_transient(&self.retry, "bulk upsert", || {
            let body = body.clone();
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/x-ndjson")
                    .body(body)
                    .send()
                    .await
                    .map_err(|err| SinkError::Unavailable(err.to_string()))?;

                let status = response.status();
                if status.is_server_error() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(SinkError::Unavailable(format!("HTTP {status}: {text}")));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(SinkError::Rejected(format!("HTTP {status}: {text}")));
                }
                response
                    .json::<Value>()
                    .await
                    .map_err(|err| SinkError::Rejected(format!("unreadable bulk response: {err}")))
            }
        })
        .await?;

        if let Some(reasons) = bulk_rejections(&response_body) {
            return Err(SinkError::Rejected(reasons));
        }
        debug!(documents = documents.len(), "Bulk upsert acknowledged");
        Ok(())
    }
}

/// Render the NDJSON `_bulk` payload: an action line naming the
/// destination index and document id, then the document body.
fn render_bulk_body(documents: &[Document]) -> Result<String, SinkError> {
    let mut body = String::new();
    for document in documents {
        let action = serde_json::json!({
            "index": { "_index": document.index().as_str(), "_id": document.id() }
        });
        body.push_str(&action.to_string());
        body.push('\n');
        let source = serde_json::to_string(document)
            .map_err(|err| SinkError::Rejected(format!("unserializable document: {err}")))?;
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// Failure reasons from a bulk response, if the engine flagged any.
fn bulk_rejections(response: &Value) -> Option<String> {
    if !response
        .get("errors")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return None;
    }

    let mut reasons = Vec::new();
    if let Some(items) = response.get("items").and_then(Value::as_array) {
        for item in items {
            let Some(op) = item.as_object().and_then(|ops| ops.values().next()) else {
                continue;
            };
            if let Some(error) = op.get("error") {
                let id = op.get("_id").and_then(Value::as_str).unwrap_or("?");
                let reason = error
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown reason");
                reasons.push(format!("{id}: {reason}"));
            }
        }
    }
    if reasons.is_empty() {
        return Some("bulk response flagged errors".to_string());
    }
    if reasons.len() > 5 {
        let total = reasons.len();
        reasons.truncate(5);
        reasons.push(format!("and {} more", total - 5));
    }
    Some(reasons.join("; "))
}
