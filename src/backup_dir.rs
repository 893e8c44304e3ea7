//! Location and naming of the backup folder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tracing::{info, warn};

use crate::constants::{BACKUP_DIR_TIME_FORMAT, DEFAULT_BACKUP_DIR_NAME};
use crate::error::BackupDirError;

/// Returns the folder name for a backup started at `time`:
/// `YYYY-MM-DD_HHMMSS[_<custom_name>]`.
///
/// Path separators in `custom_name` are replaced with `_` so the name always
/// stays a single folder.
pub fn backup_dir_name<Tz: TimeZone>(time: &DateTime<Tz>, custom_name: Option<&str>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = time.format(BACKUP_DIR_TIME_FORMAT).to_string();
    match custom_name.map(str::trim).filter(|s| !s.is_empty()) {
        Some(custom) => {
            let custom = custom.replace(['/', '\\'], "_");
            format!("{stamp}_{custom}")
        }
        None => stamp,
    }
}

/// Returns the path of a backup folder started now under `backup_location`.
pub fn working_backup_dir(backup_location: &Path, custom_name: Option<&str>) -> PathBuf {
    backup_location.join(backup_dir_name(&Local::now(), custom_name))
}

/// Creates a fresh backup folder under `backup_location`, creating
/// `backup_location` itself if needed.
///
/// # Errors
/// Fails if the folder already exists; an existing backup is never reused.
pub fn create_working_backup_dir(
    backup_location: &Path,
    custom_name: Option<&str>,
) -> Result<PathBuf, BackupDirError> {
    fs::create_dir_all(backup_location).map_err(|e| BackupDirError::Create {
        path: backup_location.to_path_buf(),
        source: e,
    })?;
    let dir = working_backup_dir(backup_location, custom_name);
    match fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(BackupDirError::AlreadyExists(dir))
        }
        Err(e) => Err(BackupDirError::Create { path: dir, source: e }),
    }
}

/// The destination used when none is given: a `mindbkp` folder next to the
/// application root.
pub fn default_backup_location(app_root: &Path) -> PathBuf {
    app_root
        .parent()
        .unwrap_or(app_root)
        .join(DEFAULT_BACKUP_DIR_NAME)
}

/// Picks the destination root. A requested location that is not an existing
/// directory is replaced by the default, with a warning.
pub fn resolve_backup_location(requested: Option<&Path>, app_root: &Path) -> PathBuf {
    let default = default_backup_location(app_root);
    match requested {
        Some(path) if path.is_dir() => {
            info!("Creating the backup in folder: {}", path.display());
            path.to_path_buf()
        }
        Some(path) => {
            warn!(
                "The backup directory {} does not exist. Using the default backup folder: {}",
                path.display(),
                default.display()
            );
            default
        }
        None => default,
    }
}
