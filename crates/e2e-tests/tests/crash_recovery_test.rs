//! Crash-recovery E2E tests.
//!
//! The persisted watermark trails the in-memory frontier by one page,
//! so a crash after a fetch replays that page on restart. These tests
//! pin both halves of the contract: the replay happens, and it
//! assembles documents identical to the lost run, which the id-keyed
//! upsert then overwrites harmlessly.

use pretty_assertions::assert_eq;

use e2e_tests::{changed_row, film_row, ts, TestHarness};
use filmsync_pipeline::assemble;
use filmsync_state::{FileWatermarkStore, WatermarkStore};
use filmsync_types::schema::{format_watermark, EPOCH_WATERMARK};
use filmsync_types::{query, IndexName, Schema};

fn movie_only() -> Vec<Schema> {
    vec![Schema::direct(
        "movie",
        IndexName::Movies,
        query::CHANGED_FILM_IDS,
        query::FILM_ROWS,
    )]
}

fn movie_schema() -> Schema {
    movie_only().remove(0)
}

/// Crash between a fetch and the next persist leaves the old watermark
/// on disk; the restarted process refetches the same page and produces
/// the same documents.
#[tokio::test]
async fn test_restart_replays_the_unpersisted_page() {
    let mut harness = TestHarness::new();
    harness
        .source
        .push_response(vec![changed_row("f1", ts(5))]);
    harness.source.push_response(vec![film_row(
        "f1",
        "The Thing",
        Some(("actor", "p1", "Kurt Russell")),
        None,
        None,
    )]);

    let tracker = harness.tracker(movie_schema());
    let mut stream = tracker.next_batch();
    let batch = stream.next().await.unwrap().expect("one page of changes");
    let lost_documents = assemble(batch.index, &batch.rows).unwrap();
    assert_eq!(lost_documents.len(), 1);

    // Crash here: the fetched page never reached the sink, and the
    // advanced frontier never reached the disk.
    drop(stream);
    drop(tracker);
    let on_disk = FileWatermarkStore::open(&harness.state_path).unwrap();
    assert_eq!(
        on_disk.get("movie").unwrap().as_deref(),
        Some(EPOCH_WATERMARK)
    );

    harness.restart();
    harness
        .source
        .push_response(vec![changed_row("f1", ts(5))]);
    harness.source.push_response(vec![film_row(
        "f1",
        "The Thing",
        Some(("actor", "p1", "Kurt Russell")),
        None,
        None,
    )]);

    harness
        .orchestrator_for(movie_only())
        .run_once()
        .await
        .unwrap();

    // Same page, same documents; the upsert replaces, not duplicates.
    assert!(harness.source.queries()[0].contains(EPOCH_WATERMARK));
    let replayed = harness.sink.documents();
    assert_eq!(replayed.len(), 1);
    assert_eq!(Some(&replayed[0]), lost_documents.get("f1"));

    let on_disk = FileWatermarkStore::open(&harness.state_path).unwrap();
    assert_eq!(
        on_disk.get("movie").unwrap(),
        Some(format_watermark(ts(5)))
    );
}

/// A drain that ran to completion needs no replay: the restarted
/// process resumes past the synced page.
#[tokio::test]
async fn test_completed_drain_resumes_past_synced_pages() {
    let mut harness = TestHarness::new();
    harness
        .source
        .push_response(vec![changed_row("f1", ts(5))]);
    harness
        .source
        .push_response(vec![film_row("f1", "The Thing", None, None, None)]);

    harness
        .orchestrator_for(movie_only())
        .run_once()
        .await
        .unwrap();

    harness.restart();
    harness
        .orchestrator_for(movie_only())
        .run_once()
        .await
        .unwrap();

    let queries = harness.source.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains(&format!("modified > '{}'", format_watermark(ts(5)))));
    assert!(harness.sink.batches().is_empty());
}

/// The watermark file on disk is a flat JSON object, one string marker
/// per tracking key.
#[tokio::test]
async fn test_watermark_file_is_flat_json() {
    let harness = TestHarness::new();
    harness
        .source
        .push_response(vec![changed_row("f1", ts(5))]);
    harness
        .source
        .push_response(vec![film_row("f1", "The Thing", None, None, None)]);

    harness
        .orchestrator_for(movie_only())
        .run_once()
        .await
        .unwrap();

    let text = std::fs::read_to_string(&harness.state_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let object = value.as_object().expect("flat JSON object");
    assert_eq!(
        object.get("movie").and_then(|v| v.as_str()),
        Some(format_watermark(ts(5)).as_str())
    );
}
