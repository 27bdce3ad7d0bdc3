//! ## dvrsim-cli
//! **Command-line front end of the DVR storage simulator**
//!
//! `dvrsim run` executes one seeded simulation and prints its report;
//! `dvrsim sweep` runs both scheduling policies over a range of seeds in
//! parallel and prints a comparison table.
//!
//! ### Expectations:
//! - Flags override configuration files, which override built-in defaults
//! - Log verbosity follows `RUST_LOG`; reports go to stdout, logs to stderr

use std::process::ExitCode;

use clap::Parser;
use dvrsim_telemetry::EventLogger;

mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    EventLogger::init();
    let cli = Cli::parse();

    match commands::run_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            error::exit_code(&err)
        }
    }
}
