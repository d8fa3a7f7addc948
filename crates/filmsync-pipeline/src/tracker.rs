//! Watermark-driven change tracking.
//!
//! One [`ChangeTracker`] per schema pages through "ids changed since
//! the watermark" queries, cascading dependency changes onto the
//! aggregates that embed them, and fetches the full joined rows for
//! each affected id page.
//!
//! Watermark commit timing: at the start of every page iteration the
//! tracker persists the watermark it is about to query with, which is
//! the value advanced in memory by the *previous* page. The newest
//! fetched timestamp reaches the store only one iteration later. A
//! crash between fetch and the next persist therefore replays the last
//! page on restart; the sink's id-keyed upsert makes that replay
//! harmless.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use filmsync_state::WatermarkStore;
use filmsync_types::query;
use filmsync_types::schema::{format_watermark, SchemaKind, EPOCH_WATERMARK};
use filmsync_types::{IndexName, Row, Schema};

use crate::error::PipelineError;
use crate::source::ChangeSource;

/// One page of denormalized rows bound for a destination index.
#[derive(Debug)]
pub struct Batch {
    pub index: IndexName,
    pub rows: Vec<Row>,
}

/// Tracks sync progress for a single schema.
///
/// Holds the in-memory watermark cache that carries just-advanced
/// values between pages and across drain cycles; the durable store
/// always trails it by one page while paging is in flight.
pub struct ChangeTracker {
    schema: Schema,
    source: Arc<dyn ChangeSource>,
    store: Arc<dyn WatermarkStore>,
    local: Mutex<HashMap<String, String>>,
}

impl ChangeTracker {
    pub fn new(
        schema: Schema,
        source: Arc<dyn ChangeSource>,
        store: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            schema,
            source,
            store,
            local: Mutex::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Start one drain cycle: a finite stream of batches covering all
    /// changes currently behind the watermark frontier. Call again on
    /// the next poll cycle to pick up from where this one advanced.
    pub fn next_batch(&self) -> BatchStream<'_> {
        BatchStream {
            tracker: self,
            cascade_ids: None,
            done: false,
        }
    }

    /// Current watermark for a key: the in-memory just-advanced value
    /// if one exists, else the stored value, else the epoch.
    fn last_tracked(&self, key: &str) -> Result<String, PipelineError> {
        if let Some(cached) = self.local.lock().expect("watermark cache poisoned").get(key) {
            return Ok(cached.clone());
        }
        Ok(self
            .store
            .get(key)?
            .unwrap_or_else(|| EPOCH_WATERMARK.to_string()))
    }

    /// Fetch the next page of changed ids for `key`.
    ///
    /// Persists the current watermark before querying, then advances
    /// the in-memory cache to the page's trailing `modified` value.
    /// Returns `None` on an empty page, which ends pagination.
    async fn next_changed_page(
        &self,
        key: &str,
        template: &str,
        tracked_ids: Option<&str>,
    ) -> Result<Option<Vec<String>>, PipelineError> {
        let last_tracked = self.last_tracked(key)?;
        self.store.set(key, &last_tracked)?;

        let sql = query::render_changed_ids(template, &last_tracked, tracked_ids);
        let rows = self.source.fetch_rows(&sql).await?;
        if rows.is_empty() {
            debug!(key, watermark = %last_tracked, "No changes behind watermark");
            return Ok(None);
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut newest = None;
        for row in &rows {
            ids.push(row.get_str("id")?.to_string());
            newest = Some(row.get_timestamp("modified")?);
        }
        if let Some(ts) = newest {
            self.local
                .lock()
                .expect("watermark cache poisoned")
                .insert(key.to_string(), format_watermark(ts));
        }

        debug!(key, count = ids.len(), "Fetched changed-id page");
        Ok(Some(ids))
    }

    /// Full aggregate rows for an id page. An empty id set skips the
    /// query entirely; rendering it would produce a malformed `IN ()`.
    async fn fetch_rows_for_ids(&self, ids: &[String]) -> Result<Vec<Row>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = query::render_data(&self.schema.data_sql, &query::quote_ids(ids));
        Ok(self.source.fetch_rows(&sql).await?)
    }

    /// Reset the cascade watermark to the epoch, in the store and the
    /// cache, so the next second-hop scan covers every aggregate
    /// related to the new dependency page regardless of how long ago
    /// those aggregates themselves changed.
    fn reset_cascade_watermark(&self) -> Result<(), PipelineError> {
        let key = &self.schema.related_key;
        self.store.set(key, EPOCH_WATERMARK)?;
        self.local
            .lock()
            .expect("watermark cache poisoned")
            .insert(key.clone(), EPOCH_WATERMARK.to_string());
        debug!(key = %key, "Cascade watermark reset to epoch");
        Ok(())
    }
}

/// Async iterator over one drain cycle of a tracker.
///
/// Dropping it mid-cycle is safe: progress persisted so far stands,
/// and the next cycle resumes from the in-memory frontier.
pub struct BatchStream<'a> {
    tracker: &'a ChangeTracker,
    /// Quoted dependency ids for the cascade hop currently being paged.
    cascade_ids: Option<String>,
    done: bool,
}

impl BatchStream<'_> {
    /// Next batch of rows, or `None` when the cycle is drained.
    pub async fn next(&mut self) -> Result<Option<Batch>, PipelineError> {
        if self.done {
            return Ok(None);
        }
        let schema = &self.tracker.schema;
        loop {
            match &schema.kind {
                SchemaKind::Direct => {
                    let page = self
                        .tracker
                        .next_changed_page(&schema.tracking_key, &schema.changed_ids_sql, None)
                        .await?;
                    let Some(ids) = page else {
                        self.done = true;
                        return Ok(None);
                    };
                    let rows = self.tracker.fetch_rows_for_ids(&ids).await?;
                    return Ok(Some(Batch {
                        index: schema.index,
                        rows,
                    }));
                }
                SchemaKind::Cascading { cascade_sql } => {
                    if let Some(ids) = self.cascade_ids.clone() {
                        let page = self
                            .tracker
                            .next_changed_page(&schema.related_key, cascade_sql, Some(&ids))
                            .await?;
                        match page {
                            Some(aggregate_ids) => {
                                let rows = self.tracker.fetch_rows_for_ids(&aggregate_ids).await?;
                                return Ok(Some(Batch {
                                    index: schema.index,
                                    rows,
                                }));
                            }
                            None => {
                                // This dependency page is fully cascaded.
                                self.cascade_ids = None;
                                continue;
                            }
                        }
                    }

                    let page = self
                        .tracker
                        .next_changed_page(&schema.tracking_key, &schema.changed_ids_sql, None)
                        .await?;
                    let Some(dependency_ids) = page else {
                        self.done = true;
                        return Ok(None);
                    };
                    self.tracker.reset_cascade_watermark()?;
                    self.cascade_ids = Some(query::quote_ids(&dependency_ids));
                }
            }
        }
    }
}
