//! Daemon binary crate: CLI definitions and command implementations.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{run_loop, run_sweep, show_watermarks};
