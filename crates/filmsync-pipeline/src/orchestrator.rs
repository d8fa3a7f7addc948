//! Sweep-and-sleep orchestration across all schemas.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use filmsync_state::WatermarkStore;
use filmsync_types::{Document, Schema};

use crate::assembler::assemble;
use crate::error::PipelineError;
use crate::sink::DocumentSink;
use crate::source::ChangeSource;
use crate::tracker::ChangeTracker;

/// Counters for one sweep across every tracker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Row pages drained from the trackers.
    pub batches: usize,
    /// Raw rows fetched across all pages.
    pub rows: usize,
    /// Documents upserted into the sink.
    pub documents: usize,
}

impl SweepStats {
    /// True when the sweep moved any data at all.
    pub fn has_updates(&self) -> bool {
        self.batches > 0
    }
}

/// Drives the sync: one tracker per schema, drained in catalog order,
/// feeding assembled documents to the shared sink.
pub struct SyncOrchestrator {
    trackers: Vec<ChangeTracker>,
    sink: Arc<dyn DocumentSink>,
    poll_interval: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        schemas: Vec<Schema>,
        source: Arc<dyn ChangeSource>,
        sink: Arc<dyn DocumentSink>,
        store: Arc<dyn WatermarkStore>,
        poll_interval: Duration,
    ) -> Self {
        let trackers = schemas
            .into_iter()
            .map(|schema| ChangeTracker::new(schema, source.clone(), store.clone()))
            .collect();
        Self {
            trackers,
            sink,
            poll_interval,
        }
    }

    /// One sweep: drain every tracker fully, sinking each batch before
    /// moving on. Batches that assemble to zero documents are skipped.
    pub async fn run_once(&self) -> Result<SweepStats, PipelineError> {
        let mut stats = SweepStats::default();
        for tracker in &self.trackers {
            let key = tracker.schema().tracking_key.clone();
            let mut stream = tracker.next_batch();
            while let Some(batch) = stream.next().await? {
                let documents = assemble(batch.index, &batch.rows)?;
                stats.batches += 1;
                stats.rows += batch.rows.len();
                if documents.is_empty() {
                    debug!(schema = %key, "Batch assembled to no documents, skipping sink");
                    continue;
                }
                let documents: Vec<Document> = documents.into_values().collect();
                self.sink.bulk_upsert(&documents).await?;
                stats.documents += documents.len();
                info!(
                    schema = %key,
                    index = %batch.index,
                    rows = batch.rows.len(),
                    documents = documents.len(),
                    "Synced batch"
                );
            }
        }
        Ok(stats)
    }

    /// Sweep, sleep, repeat until `shutdown` fires.
    ///
    /// There is no other exit path: an idle source just produces empty
    /// sweeps. Errors abort the loop and propagate to the caller.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        info!(
            schemas = self.trackers.len(),
            interval_secs = self.poll_interval.as_secs(),
            "Sync loop started"
        );
        loop {
            let stats = self.run_once().await?;
            if stats.has_updates() {
                info!(
                    batches = stats.batches,
                    rows = stats.rows,
                    documents = stats.documents,
                    "Sweep complete"
                );
            } else {
                debug!("Sweep found no changes");
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping sync loop");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use filmsync_state::MemoryWatermarkStore;
    use filmsync_types::{query, IndexName, Row};

    use super::*;
    use crate::sink::SinkError;
    use crate::source::SourceError;

    struct ScriptedSource {
        responses: Mutex<VecDeque<Vec<Row>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Vec<Row>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl ChangeSource for ScriptedSource {
        async fn fetch_rows(&self, _sql: &str) -> Result<Vec<Row>, SourceError> {
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Vec<Document>>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<Vec<Document>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentSink for RecordingSink {
        async fn bulk_upsert(&self, documents: &[Document]) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(documents.to_vec());
            Ok(())
        }
    }

    fn genre_catalog() -> Vec<Schema> {
        vec![Schema::direct(
            "genre_index",
            IndexName::Genres,
            query::CHANGED_GENRE_IDS,
            query::GENRE_ROWS,
        )]
    }

    fn changed(id: &str, secs: u32) -> Row {
        let modified = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, secs)
            .unwrap();
        Row::new().with("id", id).with("modified", modified)
    }

    fn genre(id: &str, name: &str) -> Row {
        Row::new()
            .with("id", id)
            .with("name", name)
            .with("description", None::<String>)
    }

    #[tokio::test]
    async fn test_run_once_sinks_assembled_batches() {
        let source = Arc::new(ScriptedSource::new(vec![
            vec![changed("g1", 1), changed("g2", 2)],
            vec![genre("g1", "Horror"), genre("g2", "Sci-Fi")],
            vec![],
        ]));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = SyncOrchestrator::new(
            genre_catalog(),
            source,
            sink.clone(),
            Arc::new(MemoryWatermarkStore::new()),
            Duration::from_secs(10),
        );

        let stats = orchestrator.run_once().await.unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.documents, 2);

        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert!(calls[0].iter().all(|d| d.index() == IndexName::Genres));
    }

    #[tokio::test]
    async fn test_empty_sweep_never_touches_the_sink() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = SyncOrchestrator::new(
            genre_catalog(),
            source,
            sink.clone(),
            Arc::new(MemoryWatermarkStore::new()),
            Duration::from_secs(10),
        );

        let stats = orchestrator.run_once().await.unwrap();
        assert!(!stats.has_updates());
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_with_no_documents_is_not_sunk() {
        // Changed ids exist but the data query finds nothing, e.g. the
        // rows vanished between the two queries.
        let source = Arc::new(ScriptedSource::new(vec![
            vec![changed("g1", 1)],
            vec![],
            vec![],
        ]));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = SyncOrchestrator::new(
            genre_catalog(),
            source,
            sink.clone(),
            Arc::new(MemoryWatermarkStore::new()),
            Duration::from_secs(10),
        );

        let stats = orchestrator.run_once().await.unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.documents, 0);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = SyncOrchestrator::new(
            genre_catalog(),
            source,
            sink,
            Arc::new(MemoryWatermarkStore::new()),
            Duration::from_millis(5),
        );

        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { orchestrator.run(token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
