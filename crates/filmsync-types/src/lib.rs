//! Core types shared across the filmsync workspace.
//!
//! This crate defines the vocabulary the rest of the system speaks:
//! raw [`Row`]s as they come back from the relational store, assembled
//! search [`Document`]s, the per-entity [`Schema`] catalog that drives
//! change tracking, query templates, and layered [`Settings`].

pub mod document;
pub mod error;
pub mod query;
pub mod row;
pub mod schema;
pub mod settings;

pub use document::{Document, FilmDocument, GenreDocument, IndexName, NamedRef, PersonDocument};
pub use error::{ConfigError, RowError};
pub use row::{FieldValue, Row};
pub use schema::{default_schemas, Schema, SchemaKind, EPOCH_WATERMARK};
pub use settings::Settings;
