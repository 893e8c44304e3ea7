//! Copy of application trees into the backup folder.
//!
//! Trees are walked with `walkdir`. Every directory is resolved before
//! anything in it is copied, so an excluded subdirectory is never read.
//! A failure aborts the current application only; the remaining
//! applications are still copied.

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::context::BackupContext;
use crate::error::CopyError;
use crate::matcher::EntrySet;
use crate::resolver::{self, Resolution};

/// Counters for one copied application.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub links: usize,
    /// Entries left out by the exclusion rules.
    pub skipped: usize,
}

/// What happened to one top-level entry.
#[derive(Debug)]
pub enum AppOutcome {
    Copied(CopyStats),
    SkippedUnrecognized,
    Failed(CopyError),
}

#[derive(Debug)]
pub struct AppReport {
    pub name: String,
    pub outcome: AppOutcome,
}

/// Per-application outcomes of a run, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<AppReport>,
}

impl RunSummary {
    pub fn copied(&self) -> impl Iterator<Item = &AppReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, AppOutcome::Copied(_)))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &AppReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, AppOutcome::SkippedUnrecognized))
    }

    pub fn failed(&self) -> impl Iterator<Item = &AppReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, AppOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn outcome(&self, name: &str) -> Option<&AppOutcome> {
        self.reports
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }
}

/// Which part of an entry is copied.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Whole,
    /// Only these paths, relative to the entry.
    Within(Vec<PathBuf>),
}

impl Scope {
    /// Scope of the child `name`, or `None` if nothing below `name` is wanted.
    fn child(&self, name: &Path) -> Option<Scope> {
        let Scope::Within(paths) = self else {
            return Some(Scope::Whole);
        };
        let mut below = vec![];
        for path in paths {
            let mut components = path.components();
            match components.next() {
                Some(Component::Normal(first)) if first == name.as_os_str() => {}
                _ => continue,
            }
            let rest = components.as_path();
            if rest.as_os_str().is_empty() {
                return Some(Scope::Whole);
            }
            below.push(rest.to_path_buf());
        }
        if below.is_empty() {
            None
        } else {
            Some(Scope::Within(below))
        }
    }

    /// Restricts this scope to the paths an override re-included.
    fn narrow(self, rescued: &[PathBuf]) -> Option<Scope> {
        let paths = match self {
            Scope::Whole => rescued.to_vec(),
            Scope::Within(wanted) => {
                let mut paths = vec![];
                for w in &wanted {
                    for r in rescued {
                        let deeper = if w.starts_with(r) {
                            w
                        } else if r.starts_with(w) {
                            r
                        } else {
                            continue;
                        };
                        if !paths.contains(deeper) {
                            paths.push(deeper.clone());
                        }
                    }
                }
                paths
            }
        };
        if paths.is_empty() {
            None
        } else {
            Some(Scope::Within(paths))
        }
    }
}

fn read_entries(dir: &Path) -> Result<EntrySet, CopyError> {
    let mut entries = EntrySet::new();
    for entry in fs::read_dir(dir).map_err(|e| CopyError::io(dir, e))? {
        let entry = entry.map_err(|e| CopyError::io(dir, e))?;
        entries.insert(entry.file_name());
    }
    Ok(entries)
}

/// A directory whose entries are being copied.
struct OpenDir {
    dest: PathBuf,
    scope: Scope,
    resolution: Resolution,
}

struct TreeCopier<'a> {
    ctx: &'a BackupContext,
    stats: CopyStats,
}

impl TreeCopier<'_> {
    /// Creates the destination of `src` and resolves its entries.
    fn open_dir(&mut self, src: &Path, dest: PathBuf, scope: Scope) -> Result<OpenDir, CopyError> {
        fs::create_dir_all(&dest).map_err(|e| CopyError::io(&dest, e))?;
        self.stats.dirs += 1;
        let entries = read_entries(src)?;
        let resolution = resolver::resolve(self.ctx, src, &entries)?;
        Ok(OpenDir {
            dest,
            scope,
            resolution,
        })
    }

    /// Scope of the entry `name` of `parent`, or `None` if it is left out.
    fn admit(&mut self, parent: &OpenDir, src: &Path, name: &OsStr) -> Option<Scope> {
        let mut child = parent.scope.child(Path::new(name))?;
        if parent.resolution.is_ignored(name) {
            match parent.resolution.rescued(name).and_then(|r| child.narrow(r)) {
                Some(narrowed) => child = narrowed,
                None => {
                    debug!("Skipping {}", src.display());
                    self.stats.skipped += 1;
                    return None;
                }
            }
        }
        Some(child)
    }

    /// Walks `src` and copies what the rules keep into `dest`. Each directory
    /// is resolved when the walk enters it, before any of its entries is seen.
    fn copy_dir(&mut self, src: &Path, dest: &Path) -> Result<(), CopyError> {
        // Open directories from `src` down to the parent of the current entry.
        let mut open: Vec<OpenDir> = vec![];
        let mut walker = WalkDir::new(src).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry?;
            open.truncate(entry.depth());
            let is_dir = entry.file_type().is_dir();

            let (target, scope) = match open.last() {
                None => (dest.to_path_buf(), Scope::Whole),
                Some(parent) => {
                    let Some(scope) = self.admit(parent, entry.path(), entry.file_name()) else {
                        if is_dir {
                            walker.skip_current_dir();
                        }
                        continue;
                    };
                    (parent.dest.join(entry.file_name()), scope)
                }
            };

            if is_dir {
                if entry.depth() > 0 && self.ctx.is_backup_dir(entry.path()) {
                    info!(
                        "Skipping {}, the backup is being written there",
                        entry.path().display()
                    );
                    self.stats.skipped += 1;
                    walker.skip_current_dir();
                    continue;
                }
                let dir = self.open_dir(entry.path(), target, scope)?;
                open.push(dir);
            } else if scope == Scope::Whole {
                self.copy_entry(&entry, &target)?;
            }
            // Otherwise only paths below this file were re-included, and
            // there are none.
        }
        Ok(())
    }

    fn copy_entry(&mut self, entry: &DirEntry, dest: &Path) -> Result<(), CopyError> {
        let src = entry.path();
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            self.copy_link(src, dest)
        } else if file_type.is_file() {
            debug!("Copying {}", src.display());
            fs::copy(src, dest).map_err(|e| CopyError::io(src, e))?;
            self.stats.files += 1;
            Ok(())
        } else {
            warn!("Skipping special file {}", src.display());
            self.stats.skipped += 1;
            Ok(())
        }
    }

    #[cfg(unix)]
    fn copy_link(&mut self, src: &Path, dest: &Path) -> Result<(), CopyError> {
        let target = fs::read_link(src).map_err(|e| CopyError::io(src, e))?;
        debug!("Linking {} -> {}", dest.display(), target.display());
        std::os::unix::fs::symlink(&target, dest).map_err(|e| CopyError::io(dest, e))?;
        self.stats.links += 1;
        Ok(())
    }

    #[cfg(not(unix))]
    fn copy_link(&mut self, src: &Path, dest: &Path) -> Result<(), CopyError> {
        fs::copy(src, dest).map_err(|e| CopyError::io(src, e))?;
        self.stats.links += 1;
        Ok(())
    }
}

/// Copies the application `name` from the application root into `dest_root`.
///
/// Returns [`AppOutcome::SkippedUnrecognized`] without touching the
/// destination when `name` has no signature.
pub fn copy_application(ctx: &BackupContext, name: &str, dest_root: &Path) -> AppOutcome {
    if !ctx.document().has_application(name) {
        warn!(
            "Directory <{name}> is not in the configured list of applications and it will not be backed up"
        );
        return AppOutcome::SkippedUnrecognized;
    }
    info!("Doing backup for <{name}>");

    let src = ctx.app_root().join(name);
    let dest = dest_root.join(name);
    let mut copier = TreeCopier {
        ctx,
        stats: CopyStats::default(),
    };
    let result = if src.is_dir() {
        copier.copy_dir(&src, &dest)
    } else {
        Err(CopyError::NotADirectory(src))
    };
    match result {
        Ok(()) => {
            let stats = copier.stats;
            debug!("Backup of <{name}> finished: {stats:?}");
            AppOutcome::Copied(stats)
        }
        Err(e) => {
            warn!("Backup of <{name}> failed and was abandoned: {e}");
            AppOutcome::Failed(e)
        }
    }
}

/// Copies every selected application into `dest_root`, one at a time.
///
/// An empty `selection` means every entry of the application root, in name order.
///
/// # Errors
/// Returns an error only if the application root cannot be listed. Failures
/// of individual applications are reported in the [`RunSummary`].
pub fn copy_tree(
    ctx: &BackupContext,
    dest_root: &Path,
    selection: &[String],
) -> Result<RunSummary, CopyError> {
    info!(
        "Beginning to backup the directory {}",
        ctx.app_root().display()
    );
    let names: Vec<String> = if selection.is_empty() {
        read_entries(ctx.app_root())?
            .into_iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    } else {
        selection.to_vec()
    };

    let mut summary = RunSummary::default();
    for name in names {
        if ctx.is_backup_dir(&ctx.app_root().join(&name)) {
            debug!("Skipping <{name}>, the backup is being written there");
            continue;
        }
        let outcome = copy_application(ctx, &name, dest_root);
        summary.reports.push(AppReport { name, outcome });
    }
    Ok(summary)
}
