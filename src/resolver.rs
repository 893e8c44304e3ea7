//! Computes which entries of a directory are left out of the backup.
//!
//! Rules come in two classes: the global rules, applied to every application,
//! and the rules of the application's own signature. Each class is evaluated
//! on its own: its `ignore = false` matches are subtracted from its
//! `ignore = true` matches. The ignore set is the union of both classes'
//! results, so an override in one class never cancels an exclusion made by
//! the other.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::context::BackupContext;
use crate::error::{MatchError, ResolveError};
use crate::matcher::{Candidates, EntrySet, expand};
use crate::signature::FileRule;

/// Paths below an entry, relative to that entry.
type Rescues = BTreeMap<OsString, BTreeSet<PathBuf>>;

/// The outcome of resolving one directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Entry names to skip.
    pub ignored: EntrySet,
    /// Ignored directories that still contain re-included paths, mapped to
    /// those paths relative to the directory.
    pub rescued: BTreeMap<OsString, Vec<PathBuf>>,
    /// The directory belongs to an application without a signature.
    pub unrecognized: bool,
}

impl Resolution {
    pub fn is_ignored(&self, name: &OsStr) -> bool {
        self.ignored.contains(name)
    }

    pub fn rescued(&self, name: &OsStr) -> Option<&[PathBuf]> {
        self.rescued.get(name).map(Vec::as_slice)
    }
}

/// Result of evaluating a single rule class.
#[derive(Debug, Default)]
struct ClassResult {
    excluded: EntrySet,
    rescued: Rescues,
}

fn resolve_class(candidates: &Candidates, rules: &[FileRule]) -> Result<ClassResult, MatchError> {
    let mut exclude = EntrySet::new();
    for rule in rules.iter().filter(|r| r.ignore) {
        exclude.extend(candidates.match_pattern(&rule.pattern)?);
    }

    let mut include = EntrySet::new();
    let mut nested = vec![];
    for rule in rules.iter().filter(|r| !r.ignore) {
        for path in expand(candidates.dir(), &rule.pattern)? {
            let same = candidates.entries_for(&path);
            if same.is_empty() {
                nested.extend(candidates.owners_of(&path));
                continue;
            }
            for name in same {
                debug!(
                    "Override '{}' re-includes <{}>",
                    rule.pattern,
                    name.to_string_lossy()
                );
                include.insert(name.to_os_string());
            }
        }
    }

    let excluded: EntrySet = exclude.difference(&include).cloned().collect();
    let mut rescued = Rescues::new();
    for (owner, rest) in nested {
        if excluded.contains(&owner) {
            rescued.entry(owner).or_default().insert(rest);
        }
    }
    Ok(ClassResult { excluded, rescued })
}

/// Returns the name of the application `directory` belongs to: its first path
/// component below `root`. `None` when `directory` is the root itself.
pub fn application_name(root: &Path, directory: &Path) -> Result<Option<OsString>, ResolveError> {
    let rel = directory
        .strip_prefix(root)
        .map_err(|_| ResolveError::OutsideRoot {
            directory: directory.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    Ok(rel.components().find_map(|c| match c {
        Component::Normal(name) => Some(name.to_os_string()),
        _ => None,
    }))
}

/// Computes the ignore set for `directory`, whose entries are `candidates`.
///
/// The result never contains a name that is not in `candidates`.
pub fn resolve(
    ctx: &BackupContext,
    directory: &Path,
    candidates: &EntrySet,
) -> Result<Resolution, ResolveError> {
    let app_name = application_name(ctx.app_root(), directory)?;
    let app_name = app_name.as_deref().and_then(OsStr::to_str).unwrap_or("");
    debug!(
        "Resolving {} of application <{}> with content {:?}",
        directory.display(),
        app_name,
        candidates
    );

    let doc = ctx.document();
    let candidates = Candidates::new(directory, candidates);
    let global = resolve_class(&candidates, &doc.general.rules)?;

    let (specific, unrecognized) = match doc.signature(app_name) {
        Some(signature) => (resolve_class(&candidates, &signature.rules)?, false),
        None => {
            warn!(
                "Directory {} belongs to <{}>, which is not a recognized application. Only global rules apply",
                directory.display(),
                app_name
            );
            (ClassResult::default(), true)
        }
    };

    let ignored: EntrySet = global.excluded.union(&specific.excluded).cloned().collect();
    let mut rescued = BTreeMap::new();
    for name in &ignored {
        let mut classes = [&global, &specific]
            .into_iter()
            .filter(|class| class.excluded.contains(name));
        let Some(first) = classes.next() else {
            continue;
        };
        let mut paths = first.rescued.get(name).cloned().unwrap_or_default();
        for class in classes {
            let other = class.rescued.get(name);
            paths.retain(|p| other.is_some_and(|o| o.contains(p)));
        }
        if !paths.is_empty() {
            rescued.insert(name.clone(), paths.into_iter().collect());
        }
    }

    debug!("The ignored list is {:?}", ignored);
    if !rescued.is_empty() {
        debug!("Re-included below ignored entries: {:?}", rescued);
    }
    Ok(Resolution {
        ignored,
        rescued,
        unrecognized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{ApplicationSignature, GlobalRuleSet, SignatureDocument};
    use std::fs;
    use std::path::MAIN_SEPARATOR;
    use tempfile::{TempDir, tempdir};

    fn names(items: &[&str]) -> EntrySet {
        items.iter().map(OsString::from).collect()
    }

    fn listing(dir: &Path) -> EntrySet {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect()
    }

    fn nested(pattern: &str) -> String {
        pattern.replace('/', &MAIN_SEPARATOR.to_string())
    }

    fn context(global: Vec<FileRule>, app1: Vec<FileRule>) -> (TempDir, BackupContext) {
        let root = tempdir().unwrap();
        let app = root.path().join("App1");
        fs::create_dir(&app).unwrap();
        fs::write(app.join("a.log"), "a").unwrap();
        fs::write(app.join("data.txt"), "d").unwrap();
        fs::create_dir(app.join("cache")).unwrap();
        fs::write(app.join("cache").join("keep.txt"), "k").unwrap();
        fs::write(app.join("cache").join("blob.bin"), "b").unwrap();

        let doc = SignatureDocument {
            general: GlobalRuleSet { rules: global },
            signatures: vec![ApplicationSignature {
                name: "App1".to_string(),
                rules: app1,
            }],
        };
        let ctx = BackupContext::new(doc, root.path());
        (root, ctx)
    }

    fn resolve_app(ctx: &BackupContext) -> Resolution {
        let dir = ctx.app_root().join("App1");
        resolve(ctx, &dir, &listing(&dir)).unwrap()
    }

    #[test]
    fn test_application_name() {
        let root = Path::new("/srv/apps");
        assert_eq!(
            application_name(root, Path::new("/srv/apps/App1/bin/x")).unwrap(),
            Some(OsString::from("App1"))
        );
        assert_eq!(
            application_name(root, Path::new("/srv/apps/App1")).unwrap(),
            Some(OsString::from("App1"))
        );
        assert_eq!(application_name(root, root).unwrap(), None);
        assert!(matches!(
            application_name(root, Path::new("/srv/other")),
            Err(ResolveError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn test_global_exclude() {
        let (_root, ctx) = context(vec![FileRule::exclude("*.log")], vec![]);
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["a.log"]));
        assert!(res.rescued.is_empty());
        assert!(!res.unrecognized);
    }

    #[test]
    fn test_global_override_within_class() {
        let (_root, ctx) = context(
            vec![FileRule::exclude("*"), FileRule::include("data.txt")],
            vec![],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["a.log", "cache"]));
    }

    #[test]
    fn test_specific_override_within_class() {
        let (_root, ctx) = context(
            vec![],
            vec![FileRule::exclude("*.*"), FileRule::include("a.log")],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["data.txt"]));
    }

    #[test]
    fn test_rule_order_within_class_is_irrelevant() {
        let (_root, ctx) = context(
            vec![],
            vec![FileRule::include("a.log"), FileRule::exclude("*.*")],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["data.txt"]));
    }

    #[test]
    fn test_global_override_does_not_cancel_specific_exclude() {
        let (_root, ctx) = context(
            vec![FileRule::include("data.txt")],
            vec![FileRule::exclude("data.txt")],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["data.txt"]));
    }

    #[test]
    fn test_specific_override_does_not_cancel_global_exclude() {
        let (_root, ctx) = context(
            vec![FileRule::exclude("*.log")],
            vec![FileRule::include("a.log")],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["a.log"]));
    }

    #[test]
    fn test_result_is_subset_of_candidates() {
        let (_root, ctx) = context(vec![FileRule::exclude("*")], vec![]);
        let dir = ctx.app_root().join("App1");
        let res = resolve(&ctx, &dir, &names(&["data.txt", "ghost"])).unwrap();
        assert_eq!(res.ignored, names(&["data.txt"]));
    }

    #[test]
    fn test_nested_override_rescues_path() {
        let (_root, ctx) = context(
            vec![FileRule::exclude("*.log")],
            vec![
                FileRule::exclude("cache"),
                FileRule::include(nested("cache/keep.txt")),
            ],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["a.log", "cache"]));
        assert_eq!(
            res.rescued(OsStr::new("cache")),
            Some(&[PathBuf::from("keep.txt")][..])
        );
    }

    #[test]
    fn test_nested_override_of_other_class_does_not_rescue() {
        let (_root, ctx) = context(
            vec![FileRule::include(nested("cache/keep.txt"))],
            vec![FileRule::exclude("cache")],
        );
        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["cache"]));
        assert!(res.rescued.is_empty());
    }

    #[test]
    fn test_excluded_by_both_classes_needs_both_rescues() {
        let (_root, ctx) = context(
            vec![
                FileRule::exclude("cache"),
                FileRule::include(nested("cache/*")),
            ],
            vec![
                FileRule::exclude("cache"),
                FileRule::include(nested("cache/keep.txt")),
            ],
        );
        let res = resolve_app(&ctx);
        assert_eq!(
            res.rescued(OsStr::new("cache")),
            Some(&[PathBuf::from("keep.txt")][..])
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_hard_linked_entries_are_excluded_together() {
        let (_root, ctx) = context(vec![], vec![FileRule::exclude("alias.txt")]);
        let app = ctx.app_root().join("App1");
        fs::hard_link(app.join("data.txt"), app.join("alias.txt")).unwrap();

        let res = resolve_app(&ctx);
        assert_eq!(res.ignored, names(&["alias.txt", "data.txt"]));
    }

    #[test]
    fn test_unrecognized_application_gets_global_rules() {
        let (root, ctx) = context(vec![FileRule::exclude("*.log")], vec![]);
        let other = root.path().join("Other");
        fs::create_dir(&other).unwrap();
        fs::write(other.join("x.log"), "x").unwrap();
        fs::write(other.join("y.txt"), "y").unwrap();

        let res = resolve(&ctx, &other, &listing(&other)).unwrap();
        assert!(res.unrecognized);
        assert_eq!(res.ignored, names(&["x.log"]));
    }

    #[test]
    fn test_patterns_are_relative_to_each_level() {
        let (_root, ctx) = context(vec![], vec![FileRule::exclude("keep.txt")]);
        let cache = ctx.app_root().join("App1").join("cache");
        let res = resolve(&ctx, &cache, &listing(&cache)).unwrap();
        assert_eq!(res.ignored, names(&["keep.txt"]));

        let res = resolve_app(&ctx);
        assert!(res.ignored.is_empty());
    }
}
