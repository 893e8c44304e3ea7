//! Glob expansion of rule patterns against a directory listing.
//!
//! A pattern is expanded on the file system relative to the directory being
//! copied. Expansions are mapped back to the directory's entries by file
//! identity rather than by name, so case-insensitive file systems and
//! differently spelled paths still resolve to the right entry.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::MatchError;

/// Directory entry names, sorted and duplicate-free.
pub type EntrySet = BTreeSet<OsString>;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// What makes two paths the same file.
///
/// On Unix this is the device and inode of the path itself; symbolic links
/// are not followed, so a link and its target are different files.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
impl FileIdentity {
    pub fn of(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::symlink_metadata(path)?;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }
}

/// What makes two paths the same file: their canonical form.
#[cfg(not(unix))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity(PathBuf);

#[cfg(not(unix))]
impl FileIdentity {
    pub fn of(path: &Path) -> io::Result<Self> {
        fs::canonicalize(path).map(Self)
    }
}

/// The entries of one directory together with their identities, computed
/// once and reused for every pattern evaluated against that directory.
pub struct Candidates<'a> {
    dir: &'a Path,
    entries: Vec<(&'a OsStr, FileIdentity)>,
}

impl<'a> Candidates<'a> {
    pub fn new(dir: &'a Path, names: &'a EntrySet) -> Self {
        let entries = names
            .iter()
            .filter_map(|name| match FileIdentity::of(&dir.join(name)) {
                Ok(id) => Some((name.as_os_str(), id)),
                Err(e) => {
                    debug!("Cannot identify {:?} in {}: {e}", name, dir.display());
                    None
                }
            })
            .collect();
        Self { dir, entries }
    }

    pub fn dir(&self) -> &Path {
        self.dir
    }

    /// Returns every entry that is the same file as `path`. Hard links
    /// give one file several names in the same directory.
    pub fn entries_for(&self, path: &Path) -> Vec<&'a OsStr> {
        let Ok(id) = FileIdentity::of(path) else {
            return vec![];
        };
        self.entries
            .iter()
            .filter(|(_, candidate)| *candidate == id)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Returns the entries that are the same file as some expansion of `pattern`.
    pub fn match_pattern(&self, pattern: &str) -> Result<EntrySet, MatchError> {
        let mut matched = EntrySet::new();
        for path in expand(self.dir, pattern)? {
            for name in self.entries_for(&path) {
                debug!("Pattern '{pattern}' matched <{}>", name.to_string_lossy());
                matched.insert(name.to_os_string());
            }
        }
        Ok(matched)
    }

    /// For an expansion that lies below one of the entries, returns the
    /// entries it lies below and the remaining path inside them. Empty for
    /// expansions that are the entries themselves or lie outside the directory.
    pub fn owners_of(&self, path: &Path) -> Vec<(OsString, PathBuf)> {
        let Ok(rel) = path.strip_prefix(self.dir) else {
            return vec![];
        };
        let mut components = rel.components();
        let Some(Component::Normal(first)) = components.next() else {
            return vec![];
        };
        let rest = components.as_path();
        if rest.as_os_str().is_empty() {
            return vec![];
        }
        self.entries_for(&self.dir.join(first))
            .into_iter()
            .map(|owner| (owner.to_os_string(), rest.to_path_buf()))
            .collect()
    }
}

/// Expands `pattern` relative to `base_dir` on the file system.
///
/// Supports `*`, `?` and `[...]` classes. Wildcards never match a leading `.`.
/// Paths that cannot be read during expansion are skipped.
pub fn expand(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, MatchError> {
    let full = format!(
        "{}{}{}",
        Pattern::escape(&base_dir.to_string_lossy()),
        MAIN_SEPARATOR,
        pattern
    );
    debug!("Expanding {full}");
    let paths = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| MatchError::Pattern {
        pattern: pattern.to_string(),
        source: e,
    })?;
    let mut expanded = vec![];
    for entry in paths {
        match entry {
            Ok(path) => expanded.push(path),
            Err(e) => debug!("Skipping unreadable path during expansion: {e}"),
        }
    }
    Ok(expanded)
}

/// Returns the subset of `candidates` (entry names of `base_dir`) that resolve
/// to the same file as any expansion of `pattern`.
///
/// An empty result is normal: most patterns name resources only some
/// applications have.
pub fn match_pattern(
    base_dir: &Path,
    pattern: &str,
    candidates: &EntrySet,
) -> Result<EntrySet, MatchError> {
    Candidates::new(base_dir, candidates).match_pattern(pattern)
}
