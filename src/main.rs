use std::path::Path;
use std::process;

use clap::Parser;
use mindbkp::commands::{self, Cli};
use mindbkp::constants::LOG_FILE_NAME;
use mindbkp::logging::initialize_logger;
use tracing::error;

/// Entry point for the mindbkp CLI application.
/// Parses command-line arguments, runs one backup and exits with its status.
fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose, Path::new(LOG_FILE_NAME));

    let code = match commands::run(&cli) {
        Ok(summary) => commands::exit_code(&summary),
        Err(e) => {
            error!("{e:#}");
            commands::error_exit_code(&e)
        }
    };
    process::exit(code);
}
