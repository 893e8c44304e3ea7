//! Command-line interface definition for mindbkp.
//!
//! This module defines the CLI arguments and the orchestration of one backup
//! run: loading the signature document, choosing the destination, selecting
//! the applications and copying them.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use crate::backup_dir;
use crate::constants::SIGNATURE_FILE_NAME;
use crate::context::BackupContext;
use crate::copier::{self, AppOutcome, RunSummary};
use crate::error::{BackupDirError, ConfigError};
use crate::selection;
use crate::signature;
use crate::sysexits;

const PROGRAM_DESCRIPTION: &str = "\
Backup the folder in which it is run based on the application descriptions in ApplicationSignatures.toml.
The backup folder name begins with a date formatted as YYYY-MM-DD_HHMMSS.";

/// Command-line interface definition for mindbkp.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = PROGRAM_DESCRIPTION)]
pub struct Cli {
    /// Give a description to your backup. It is appended to the name of the created backup folder.
    #[arg(short, long)]
    pub description: Option<String>,
    /// The path of the folder where the backup will be stored.
    #[arg(short, long = "backupdir", value_name = "PATH")]
    pub backupdir: Option<PathBuf>,
    /// Back up only these applications of the current directory.
    #[arg(short, long = "applist", value_name = "NAME", num_args = 0..)]
    pub applist: Option<Vec<String>>,
    /// Signature document to use instead of the one in the current directory.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Show debug messages on the console.
    #[arg(short, long)]
    pub verbose: bool,
}

/// The single fallback location of the signature document: next to the executable.
fn fallback_signature_file() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent().map(|dir| dir.join(SIGNATURE_FILE_NAME))
}

/// Runs one backup of the current working directory.
///
/// # Errors
/// Fails if the signature document cannot be loaded, the current directory
/// cannot be listed, or the backup folder cannot be created. Failures of
/// single applications are reported in the returned [`RunSummary`].
pub fn run(cli: &Cli) -> Result<RunSummary> {
    let app_root = env::current_dir().context("Unable to find current path")?;
    run_in(cli, &app_root)
}

/// Runs one backup of the applications found in `app_root`.
pub fn run_in(cli: &Cli, app_root: &Path) -> Result<RunSummary> {
    debug!("Starting the backup");
    debug!("Application root is {}", app_root.display());

    let primary = cli
        .config
        .clone()
        .unwrap_or_else(|| app_root.join(SIGNATURE_FILE_NAME));
    let fallback = fallback_signature_file();
    let document = signature::load_with_fallback(&primary, fallback.as_deref())?;

    let backup_location = backup_dir::resolve_backup_location(cli.backupdir.as_deref(), app_root);

    let selection = match cli.applist.as_deref() {
        Some(requested) if !requested.is_empty() => Some(
            selection::select_applications(app_root, requested)
                .with_context(|| format!("Cannot list {}", app_root.display()))?,
        ),
        _ => None,
    };

    let backup_dir =
        backup_dir::create_working_backup_dir(&backup_location, cli.description.as_deref())?;
    let ctx = BackupContext::new(document, app_root).with_backup_dir(&backup_dir);

    let summary = match selection {
        Some(names) if names.is_empty() => {
            warn!("None of the requested applications exist. Nothing will be backed up");
            RunSummary::default()
        }
        Some(names) => copier::copy_tree(&ctx, &backup_dir, &names)?,
        None => copier::copy_tree(&ctx, &backup_dir, &[])?,
    };
    report(&summary, &backup_dir);
    Ok(summary)
}

fn report(summary: &RunSummary, backup_dir: &Path) {
    for failed in summary.failed() {
        if let AppOutcome::Failed(e) = &failed.outcome {
            warn!("<{}> was not backed up: {e}", failed.name);
        }
    }
    info!(
        "{} application(s) copied, {} skipped, {} failed",
        summary.copied().count(),
        summary.skipped().count(),
        summary.failed().count()
    );
    info!(
        "You will find your backup at this location: {}",
        backup_dir.display()
    );
}

/// Exit status for a completed run.
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.has_failures() {
        sysexits::EX_IOERR
    } else {
        sysexits::EX_OK
    }
}

/// Exit status for a run that could not complete.
pub fn error_exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        sysexits::EX_CONFIG
    } else if err.downcast_ref::<BackupDirError>().is_some() {
        sysexits::EX_CANTCREAT
    } else {
        sysexits::EX_IOERR
    }
}
