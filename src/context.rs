use std::path::{Path, PathBuf};

use crate::matcher::FileIdentity;
use crate::signature::SignatureDocument;

/// Everything a backup run reads but never changes: the signature document,
/// the directory holding the installed applications and the folder the
/// backup is written to.
#[derive(Debug, Clone)]
pub struct BackupContext {
    document: SignatureDocument,
    app_root: PathBuf,
    backup_dir: Option<FileIdentity>,
}

impl BackupContext {
    pub fn new(document: SignatureDocument, app_root: impl Into<PathBuf>) -> Self {
        Self {
            document,
            app_root: app_root.into(),
            backup_dir: None,
        }
    }

    /// Marks `dir` as the folder being written, so a copy never descends
    /// into its own output when the backup folder lies inside an application.
    pub fn with_backup_dir(mut self, dir: &Path) -> Self {
        self.backup_dir = FileIdentity::of(dir).ok();
        self
    }

    pub fn document(&self) -> &SignatureDocument {
        &self.document
    }

    /// Directory whose top-level entries are the applications.
    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn is_backup_dir(&self, path: &Path) -> bool {
        match &self.backup_dir {
            Some(id) => FileIdentity::of(path).is_ok_and(|other| other == *id),
            None => false,
        }
    }
}
