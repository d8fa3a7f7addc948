//! Command-line interface definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "filmsync-daemon")]
#[command(about = "Sync movie data from Postgres into search indexes", version)]
pub struct Cli {
    /// Path to config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync loop until interrupted
    Run {
        /// Seconds between sweeps, overriding the configured interval
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run a single sweep and exit
    Sweep,

    /// Print the stored watermarks
    Watermarks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_accepts_interval_override() {
        let cli = Cli::parse_from(["filmsync-daemon", "run", "--interval", "3"]);
        match cli.command {
            Commands::Run { interval } => assert_eq!(interval, Some(3)),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_flags_apply_after_subcommand() {
        let cli = Cli::parse_from(["filmsync-daemon", "sweep", "--config", "custom.toml"]);
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        assert!(matches!(cli.command, Commands::Sweep));
    }
}
