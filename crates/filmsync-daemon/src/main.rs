//! Entry point for the sync daemon.

use anyhow::Result;
use clap::Parser;

use filmsync_daemon::{run_loop, run_sweep, show_watermarks, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { interval } => {
            run_loop(cli.config.as_deref(), cli.log_level.as_deref(), interval).await?;
        }
        Commands::Sweep => {
            run_sweep(cli.config.as_deref(), cli.log_level.as_deref()).await?;
        }
        Commands::Watermarks => {
            show_watermarks(cli.config.as_deref())?;
        }
    }

    Ok(())
}
