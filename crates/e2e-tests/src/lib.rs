//! End-to-end test infrastructure for filmsync.
//!
//! Provides a shared TestHarness plus scripted source and recording
//! sink fakes, so tests can drive the full extract-to-index pipeline
//! against a real on-disk watermark file without live Postgres or a
//! live search engine.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use filmsync_pipeline::{
    ChangeSource, ChangeTracker, DocumentSink, SinkError, SourceError, SyncOrchestrator,
};
use filmsync_state::FileWatermarkStore;
use filmsync_types::{default_schemas, Document, FieldValue, IndexName, Row, Schema};

/// Relational source fake that replays scripted responses in order.
///
/// Each `fetch_rows` call records the SQL it was asked to run, then
/// pops the next scripted response. An exhausted script answers every
/// further query with an empty page, which ends pagination naturally.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Vec<Row>>>,
    queries: Mutex<Vec<String>>,
    fail_next: Mutex<Option<SourceError>>,
}

impl ScriptedSource {
    /// Queue the response for the next unanswered query.
    pub fn push_response(&self, rows: Vec<Row>) {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .push_back(rows);
    }

    /// Make the next query fail with `error` instead of answering.
    pub fn fail_next(&self, error: SourceError) {
        *self.fail_next.lock().expect("fail_next lock poisoned") = Some(error);
    }

    /// Every SQL string fetched so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock poisoned").clone()
    }
}

#[async_trait]
impl ChangeSource for ScriptedSource {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, SourceError> {
        self.queries
            .lock()
            .expect("queries lock poisoned")
            .push(sql.to_string());
        if let Some(error) = self.fail_next.lock().expect("fail_next lock poisoned").take() {
            return Err(error);
        }
        Ok(self
            .responses
            .lock()
            .expect("responses lock poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Document sink fake that records every upserted batch.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Document>>>,
    fail_next: Mutex<Option<SinkError>>,
}

impl RecordingSink {
    /// Make the next upsert fail with `error` instead of recording.
    pub fn fail_next(&self, error: SinkError) {
        *self.fail_next.lock().expect("fail_next lock poisoned") = Some(error);
    }

    /// Every batch received so far, in arrival order.
    pub fn batches(&self) -> Vec<Vec<Document>> {
        self.batches.lock().expect("batches lock poisoned").clone()
    }

    /// All received documents flattened, in arrival order.
    pub fn documents(&self) -> Vec<Document> {
        self.batches().into_iter().flatten().collect()
    }

    /// Sorted ids of every document bound for `index`.
    pub fn ids_for(&self, index: IndexName) -> Vec<String> {
        let mut ids: Vec<String> = self
            .documents()
            .iter()
            .filter(|doc| doc.index() == index)
            .map(|doc| doc.id().to_string())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<(), SinkError> {
        if let Some(error) = self.fail_next.lock().expect("fail_next lock poisoned").take() {
            return Err(error);
        }
        self.batches
            .lock()
            .expect("batches lock poisoned")
            .push(documents.to_vec());
        Ok(())
    }
}

/// Shared harness: scripted source, recording sink, and a watermark
/// file in a temp dir that survives simulated restarts.
pub struct TestHarness {
    /// Keeps the temp dir alive for the lifetime of the harness.
    pub _temp_dir: tempfile::TempDir,
    pub state_path: PathBuf,
    pub source: Arc<ScriptedSource>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<FileWatermarkStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let state_path = temp_dir.path().join("watermarks.json");
        let store = Arc::new(
            FileWatermarkStore::open(&state_path).expect("Failed to open watermark store"),
        );
        Self {
            _temp_dir: temp_dir,
            state_path,
            source: Arc::new(ScriptedSource::default()),
            sink: Arc::new(RecordingSink::default()),
            store,
        }
    }

    /// Orchestrator over the full five-schema catalog.
    pub fn orchestrator(&self) -> SyncOrchestrator {
        self.orchestrator_for(default_schemas())
    }

    /// Orchestrator over a reduced catalog, for focused scenarios.
    pub fn orchestrator_for(&self, schemas: Vec<Schema>) -> SyncOrchestrator {
        SyncOrchestrator::new(
            schemas,
            self.source.clone(),
            self.sink.clone(),
            self.store.clone(),
            Duration::from_millis(10),
        )
    }

    /// Tracker for a single schema, for tests that step pages by hand.
    pub fn tracker(&self, schema: Schema) -> ChangeTracker {
        ChangeTracker::new(schema, self.source.clone(), self.store.clone())
    }

    /// Simulate a process restart: fresh source, sink and in-memory
    /// state, with the watermark file reopened from disk.
    pub fn restart(&mut self) {
        self.source = Arc::new(ScriptedSource::default());
        self.sink = Arc::new(RecordingSink::default());
        self.store = Arc::new(
            FileWatermarkStore::open(&self.state_path).expect("Failed to reopen watermark store"),
        );
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic `modified` timestamp, microsecond precision, `secs`
/// seconds into a fixed reference minute.
pub fn ts(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .expect("valid date")
        .and_hms_micro_opt(12, 0, secs, 500_000)
        .expect("valid time")
}

/// A changed-ids page row.
pub fn changed_row(id: &str, modified: NaiveDateTime) -> Row {
    Row::new().with("id", id).with("modified", modified)
}

/// One denormalized film row, with optional cast, genre and
/// subscription joins. `cast` is `(role, person_id, full_name)`.
pub fn film_row(
    fw_id: &str,
    title: &str,
    cast: Option<(&str, &str, &str)>,
    genre: Option<(&str, &str)>,
    subscription: Option<(&str, &str)>,
) -> Row {
    let (role, person_id, full_name) = match cast {
        Some((role, id, name)) => (
            FieldValue::from(role),
            FieldValue::from(id),
            FieldValue::from(name),
        ),
        None => (FieldValue::Null, FieldValue::Null, FieldValue::Null),
    };
    let (genre_id, genre_name) = pair(genre);
    let (subscription_id, subscription_name) = pair(subscription);
    Row::new()
        .with("fw_id", fw_id)
        .with("title", title)
        .with("description", FieldValue::Null)
        .with("rating", 7.4)
        .with("role", role)
        .with("person_id", person_id)
        .with("full_name", full_name)
        .with("genre_id", genre_id)
        .with("genre_name", genre_name)
        .with("subscription_id", subscription_id)
        .with("subscription_name", subscription_name)
}

/// One row of the standalone genres query.
pub fn genre_row(id: &str, name: &str, description: Option<&str>) -> Row {
    Row::new().with("id", id).with("name", name).with(
        "description",
        description.map(FieldValue::from).unwrap_or(FieldValue::Null),
    )
}

/// One row of the standalone persons query.
pub fn person_row(id: &str, full_name: &str, role: Option<&str>, film_id: Option<&str>) -> Row {
    Row::new()
        .with("id", id)
        .with("full_name", full_name)
        .with("role", role.map(FieldValue::from).unwrap_or(FieldValue::Null))
        .with(
            "film_work_id",
            film_id.map(FieldValue::from).unwrap_or(FieldValue::Null),
        )
}

fn pair(values: Option<(&str, &str)>) -> (FieldValue, FieldValue) {
    match values {
        Some((id, name)) => (FieldValue::from(id), FieldValue::from(name)),
        None => (FieldValue::Null, FieldValue::Null),
    }
}
