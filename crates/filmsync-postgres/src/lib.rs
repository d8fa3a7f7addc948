//! PostgreSQL implementation of the `ChangeSource` port.
//!
//! Executes the rendered extraction queries over a connection pool and
//! converts each result row into the pipeline's loosely shaped `Row`,
//! keyed by column name. Connection-level failures are retried with
//! exponential backoff; query and decode failures surface immediately.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgColumn, PgPoolOptions, PgRow};
use sqlx::types::Uuid;
use sqlx::{Column, PgPool, Row as _, TypeInfo};
use tracing::{debug, info};

use filmsync_pipeline::{ChangeSource, SourceError};
use filmsync_retry::{retry_transient, RetryPolicy};
use filmsync_types::settings::PostgresSettings;
use filmsync_types::{FieldValue, Row};

/// Change source backed by a Postgres connection pool.
pub struct PostgresSource {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresSource {
    /// Connect a pool from settings, retrying until the database is
    /// reachable.
    pub async fn connect(settings: &PostgresSettings) -> Result<Self, SourceError> {
        let retry = RetryPolicy::default();
        let url = settings.url();
        let pool = retry_transient(&retry, "postgres connect", || {
            let url = url.clone();
            async move {
                PgPoolOptions::new()
                    .max_connections(4)
                    .connect(&url)
                    .await
                    .map_err(classify)
            }
        })
        .await?;
        info!(
            host = %settings.host,
            dbname = %settings.dbname,
            "Connected to Postgres"
        );
        Ok(Self { pool, retry })
    }

    /// Wrap an existing pool, mainly for tests against a live database.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl ChangeSource for PostgresSource {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, SourceError> {
        let rows = retry_transient(&self.retry, "postgres query", || {
            let pool = self.pool.clone();
            async move { sqlx::query(sql).fetch_all(&pool).await.map_err(classify) }
        })
        .await?;
        debug!(rows = rows.len(), "Query returned");
        rows.iter().map(convert_row).collect()
    }
}

/// Split sqlx failures into the port's taxonomy: reachability problems
/// are transient, everything else is a real error in the query or the
/// data.
fn classify(err: sqlx::Error) -> SourceError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => SourceError::Unavailable(err.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => SourceError::Decode(err.to_string()),
        _ => SourceError::Query(err.to_string()),
    }
}

fn convert_row(row: &PgRow) -> Result<Row, SourceError> {
    let mut out = Row::new();
    for column in row.columns() {
        out.push(column.name(), convert_column(row, column)?);
    }
    Ok(out)
}

/// Map one column to a field value by its Postgres type. The catalog
/// queries only produce uuid, text, real and timestamp columns; any
/// other type must still decode as text or the row is rejected.
fn convert_column(row: &PgRow, column: &PgColumn) -> Result<FieldValue, SourceError> {
    let name = column.name();
    let converted = match column.type_info().name() {
        "UUID" => row
            .try_get::<Option<Uuid>, _>(name)
            .map(|v| v.map(|id| FieldValue::Text(id.to_string()))),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(name)
            .map(|v| v.map(|f| FieldValue::Float(f64::from(f)))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(name)
            .map(|v| v.map(FieldValue::Float)),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(name)
            .map(|v| v.map(FieldValue::Timestamp)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(name)
            .map(|v| v.map(|ts| FieldValue::Timestamp(ts.naive_utc()))),
        _ => row
            .try_get::<Option<String>, _>(name)
            .map(|v| v.map(FieldValue::Text)),
    };
    converted
        .map(|value| value.unwrap_or(FieldValue::Null))
        .map_err(|err| SourceError::Decode(format!("column '{name}': {err}")))
}
