//! sesh binary entry point.
//!
//! Parses command-line arguments with clap, prunes old logs, installs the
//! tracing subscriber for the selected command, and dispatches via
//! [`Cli::run`].

mod cli;
mod console;
mod logging;
mod tui;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let state_dir = cli.state_dir();

    // Best-effort, before tracing is initialized.
    logging::cleanup_old_logs(&state_dir);

    let _guard = logging::init_tracing(&state_dir, cli.log_target())?;

    cli.run().await
}
