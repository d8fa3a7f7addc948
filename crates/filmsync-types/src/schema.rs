//! The per-entity extraction catalog.
//!
//! A [`Schema`] describes one tracked entity type: where its watermark
//! lives, which queries find its changed ids, and how those ids become
//! documents in a destination index. Cascading schemas track changes
//! to a dependency (person, genre) and map them onto the aggregate
//! films that embed it.

use chrono::NaiveDateTime;

use crate::document::IndexName;
use crate::query;

/// Watermark value used when a schema has never synced.
pub const EPOCH_WATERMARK: &str = "2000-01-01";

/// Timestamp layout for persisted watermarks, microsecond precision.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a `modified` timestamp the way watermarks are stored.
pub fn format_watermark(ts: NaiveDateTime) -> String {
    ts.format(WATERMARK_FORMAT).to_string()
}

/// Whether the tracked entity is itself the aggregate or only a
/// dependency of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaKind {
    /// Changed ids feed the data query directly.
    Direct,
    /// Changed ids are dependency ids; the cascade query maps each
    /// page of them to the aggregate ids that embed them.
    Cascading { cascade_sql: String },
}

/// Immutable extraction configuration for one tracked entity type.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Watermark key for the tracked table scan.
    pub tracking_key: String,
    /// Watermark key for the cascade scan, `<tracking_key>_related`.
    pub related_key: String,
    /// Destination index for assembled documents.
    pub index: IndexName,
    /// Paginated query for changed ids of the tracked table.
    pub changed_ids_sql: String,
    /// Query producing full rows for a set of aggregate ids.
    pub data_sql: String,
    pub kind: SchemaKind,
}

impl Schema {
    /// Schema whose tracked entity is the aggregate itself.
    pub fn direct(
        tracking_key: impl Into<String>,
        index: IndexName,
        changed_ids_sql: impl Into<String>,
        data_sql: impl Into<String>,
    ) -> Self {
        let tracking_key = tracking_key.into();
        let related_key = format!("{tracking_key}_related");
        Self {
            tracking_key,
            related_key,
            index,
            changed_ids_sql: changed_ids_sql.into(),
            data_sql: data_sql.into(),
            kind: SchemaKind::Direct,
        }
    }

    /// Schema whose tracked entity is a dependency of the aggregate.
    pub fn cascading(
        tracking_key: impl Into<String>,
        index: IndexName,
        changed_ids_sql: impl Into<String>,
        cascade_sql: impl Into<String>,
        data_sql: impl Into<String>,
    ) -> Self {
        let tracking_key = tracking_key.into();
        let related_key = format!("{tracking_key}_related");
        Self {
            tracking_key,
            related_key,
            index,
            changed_ids_sql: changed_ids_sql.into(),
            data_sql: data_sql.into(),
            kind: SchemaKind::Cascading {
                cascade_sql: cascade_sql.into(),
            },
        }
    }

    /// True when changed ids must be mapped through a cascade query.
    pub fn is_cascading(&self) -> bool {
        matches!(self.kind, SchemaKind::Cascading { .. })
    }
}

/// The built-in catalog: five schemas feeding three indexes.
///
/// Order matters only for log readability; each schema owns its
/// watermark keys and syncs independently.
pub fn default_schemas() -> Vec<Schema> {
    vec![
        Schema::cascading(
            "person",
            IndexName::Movies,
            query::CHANGED_PERSON_IDS,
            query::PERSON_FILM_IDS,
            query::FILM_ROWS,
        ),
        Schema::cascading(
            "genre",
            IndexName::Movies,
            query::CHANGED_GENRE_IDS,
            query::GENRE_FILM_IDS,
            query::FILM_ROWS,
        ),
        Schema::direct(
            "movie",
            IndexName::Movies,
            query::CHANGED_FILM_IDS,
            query::FILM_ROWS,
        ),
        Schema::direct(
            "genre_index",
            IndexName::Genres,
            query::CHANGED_GENRE_IDS,
            query::GENRE_ROWS,
        ),
        Schema::direct(
            "person_index",
            IndexName::Persons,
            query::CHANGED_PERSON_IDS,
            query::PERSON_ROWS,
        ),
    ]
}
