//! Error types for every fallible stage of a backup run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The signature document could not be turned into a [`SignatureDocument`](crate::signature::SignatureDocument).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Signature document {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read signature document {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse signature document {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid signature document: {0}")]
    Invalid(String),

    #[error("No usable signature document.\n  primary: {primary}\n  fallback: {fallback}")]
    BothLocationsFailed {
        primary: Box<ConfigError>,
        fallback: Box<ConfigError>,
    },
}

/// A rule pattern could not be expanded against a directory.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Directory {directory:?} is not inside the application root {root:?}")]
    OutsideRoot { directory: PathBuf, root: PathBuf },

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Failure while copying one application. Aborts that application only.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl CopyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CopyError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum BackupDirError {
    #[error("Backup folder {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("Cannot create backup folder {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
