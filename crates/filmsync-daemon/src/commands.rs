//! Command implementations for the sync daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filmsync_elastic::ElasticSink;
use filmsync_pipeline::SyncOrchestrator;
use filmsync_postgres::PostgresSource;
use filmsync_state::{FileWatermarkStore, WatermarkStore};
use filmsync_types::{default_schemas, Settings};

/// Run the sync loop until Ctrl+C or SIGTERM.
pub async fn run_loop(
    config_path: Option<&str>,
    log_level: Option<&str>,
    interval: Option<u64>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level, interval)?;
    init_logging(&settings)?;

    info!("Filmsync daemon starting");
    info!(
        "  Postgres: {}:{}/{}",
        settings.postgres.host, settings.postgres.port, settings.postgres.dbname
    );
    info!("  Search engine: {}", settings.search.base_url());
    info!("  State file: {}", settings.sync.state_path.display());
    info!("  Poll interval: {}s", settings.sync.poll_interval_secs);

    let orchestrator = build_orchestrator(&settings).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        signal_token.cancel();
    });

    orchestrator
        .run(shutdown)
        .await
        .context("Sync loop failed")?;

    info!("Filmsync daemon stopped");
    Ok(())
}

/// Run one sweep over every schema and report what moved.
pub async fn run_sweep(config_path: Option<&str>, log_level: Option<&str>) -> Result<()> {
    let settings = load_settings(config_path, log_level, None)?;
    init_logging(&settings)?;

    let orchestrator = build_orchestrator(&settings).await?;
    let stats = orchestrator.run_once().await.context("Sweep failed")?;

    if stats.has_updates() {
        println!(
            "Sweep complete: {} batches, {} rows, {} documents",
            stats.batches, stats.rows, stats.documents
        );
    } else {
        println!("Sweep complete: nothing to sync");
    }
    Ok(())
}

/// Print the stored watermarks, one per tracking key.
pub fn show_watermarks(config_path: Option<&str>) -> Result<()> {
    let settings =
        load_settings(config_path, None, None).context("Failed to load configuration")?;
    let store = FileWatermarkStore::open(&settings.sync.state_path)
        .context("Failed to open watermark store")?;
    let entries = store.entries().context("Failed to read watermarks")?;

    if entries.is_empty() {
        println!(
            "No watermarks stored at {}",
            settings.sync.state_path.display()
        );
        return Ok(());
    }

    println!("Watermarks ({}):", settings.sync.state_path.display());
    for (key, marker) in entries {
        println!("  {key:<24} {marker}");
    }
    Ok(())
}

fn load_settings(
    config_path: Option<&str>,
    log_level: Option<&str>,
    interval: Option<u64>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path.map(PathBuf::from))
        .context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(secs) = interval {
        settings.sync.poll_interval_secs = secs;
    }
    Ok(settings)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

async fn build_orchestrator(settings: &Settings) -> Result<SyncOrchestrator> {
    let store = FileWatermarkStore::open(&settings.sync.state_path)
        .context("Failed to open watermark store")?;
    let source = PostgresSource::connect(&settings.postgres)
        .await
        .context("Failed to connect to Postgres")?;
    let sink = ElasticSink::new(&settings.search).context("Failed to build search client")?;
    sink.bootstrap_indexes()
        .await
        .context("Failed to bootstrap search indexes")?;

    Ok(SyncOrchestrator::new(
        default_schemas(),
        Arc::new(source),
        Arc::new(sink),
        Arc::new(store),
        settings.sync.poll_interval(),
    ))
}

async fn wait_for_termination() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
