//! The sync pipeline: change tracking, document assembly, orchestration.
//!
//! Everything in this crate is adapter-agnostic. The relational store
//! and the search engine are reached through the [`ChangeSource`] and
//! [`DocumentSink`] ports; production wiring plugs in the Postgres and
//! Elasticsearch adapters, tests plug in scripted fakes.
//!
//! The flow for one schema: [`ChangeTracker::next_batch`] pages through
//! changed ids behind a persisted watermark (cascading through
//! dependency-to-aggregate queries where configured), each page is
//! fetched as denormalized rows, [`assemble`] merges the rows into
//! id-keyed documents, and the orchestrator hands them to the sink.

pub mod assembler;
pub mod error;
pub mod orchestrator;
pub mod sink;
pub mod source;
pub mod tracker;

pub use assembler::assemble;
pub use error::PipelineError;
pub use orchestrator::{SyncOrchestrator, SweepStats};
pub use sink::{DocumentSink, SinkError};
pub use source::{ChangeSource, SourceError};
pub use tracker::{Batch, BatchStream, ChangeTracker};
