//! Filtering of the applications requested on the command line.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Keeps the requested applications that exist directly under `app_root`,
/// in the requested order and without duplicates. Every dropped name is
/// reported with a warning.
///
/// # Errors
/// Returns an error if `app_root` cannot be listed.
pub fn select_applications(app_root: &Path, requested: &[String]) -> io::Result<Vec<String>> {
    let present: BTreeSet<String> = fs::read_dir(app_root)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<_>>()?;
    debug!("Entries of {}: {:?}", app_root.display(), present);

    let mut selected: Vec<String> = vec![];
    for name in requested {
        if selected.contains(name) {
            continue;
        }
        if present.contains(name) {
            selected.push(name.clone());
        } else {
            warn!(
                "<{name}> is not in {} and it will not be backed up",
                app_root.display()
            );
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_keeps_order() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("App1")).unwrap();
        fs::create_dir(root.path().join("App2")).unwrap();

        let selected =
            select_applications(root.path(), &strings(&["App2", "App1", "App2"])).unwrap();
        assert_eq!(selected, strings(&["App2", "App1"]));
    }

    #[traced_test]
    #[test]
    fn test_select_drops_missing() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("App1")).unwrap();

        let selected =
            select_applications(root.path(), &strings(&["NonExistentDir", "App1"])).unwrap();
        assert_eq!(selected, strings(&["App1"]));
        assert!(logs_contain("<NonExistentDir> is not in"));

        let selected = select_applications(root.path(), &strings(&["NonExistentDir"])).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_select_missing_root() {
        let root = tempdir().unwrap();
        assert!(select_applications(&root.path().join("gone"), &strings(&["x"])).is_err());
    }
}
