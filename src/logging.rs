//! Console and log file setup.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global logger: a console layer on stderr and a file layer
/// appending to `log_file`.
///
/// The console shows INFO and above (DEBUG when `verbose`), unless `RUST_LOG`
/// says otherwise. The file always receives DEBUG and above. If the file
/// cannot be opened, only the console layer is installed.
pub fn initialize_logger(verbose: bool, log_file: &Path) {
    let default_level = if verbose { "debug" } else { "info" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_file)
    {
        Ok(file) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Failed to set global logger: {e}");
        return;
    }
    if let Some(e) = file_error {
        warn!("Cannot open log file {}: {e}", log_file.display());
    }
}
