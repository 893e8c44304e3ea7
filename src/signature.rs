//! The signature document.
//!
//! This module defines the configuration that describes which applications
//! can be backed up and which of their files and folders are skipped. The
//! document is read once per run from a TOML file and never changes afterwards.
//!
//! ```toml
//! [general]
//! [[general.file]]
//! pattern = "*.log"
//!
//! [[signature]]
//! name = "App1"
//! [[signature.file]]
//! pattern = "cache"
//! [[signature.file]]
//! pattern = "cache/keep.txt"
//! ignore = false
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// One exclusion rule.
///
/// `ignore = true` excludes every entry the pattern matches. `ignore = false`
/// re-includes entries that an `ignore = true` rule of the same class matched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileRule {
    /// Glob pattern, relative to the directory being copied.
    pub pattern: String,
    #[serde(default = "default_ignore")]
    pub ignore: bool,
}

fn default_ignore() -> bool {
    true
}

impl FileRule {
    pub fn new(pattern: impl Into<String>, ignore: bool) -> Self {
        Self {
            pattern: pattern.into(),
            ignore,
        }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self::new(pattern, true)
    }

    pub fn include(pattern: impl Into<String>) -> Self {
        Self::new(pattern, false)
    }
}

/// Rules applied to every application.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalRuleSet {
    #[serde(rename = "file", default)]
    pub rules: Vec<FileRule>,
}

/// A backed-up application, named after its top-level directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSignature {
    pub name: String,
    #[serde(rename = "file", default)]
    pub rules: Vec<FileRule>,
}

/// Root of the configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDocument {
    #[serde(default)]
    pub general: GlobalRuleSet,
    #[serde(rename = "signature", default)]
    pub signatures: Vec<ApplicationSignature>,
}

impl SignatureDocument {
    /// Parses a document from TOML text and normalizes the separators of every pattern.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let mut doc: SignatureDocument = toml::from_str(text)?;
        doc.normalize();
        Ok(doc)
    }

    /// Returns true if `name` has a signature. Names are case-sensitive.
    pub fn has_application(&self, name: &str) -> bool {
        self.signature(name).is_some()
    }

    pub fn signature(&self, name: &str) -> Option<&ApplicationSignature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    /// Returns the global rules together with the rules specific to `name`.
    /// The specific rules are empty when `name` has no signature.
    pub fn rules_for(&self, name: &str) -> (&[FileRule], &[FileRule]) {
        let specific = self
            .signature(name)
            .map(|s| s.rules.as_slice())
            .unwrap_or(&[]);
        (&self.general.rules, specific)
    }

    fn normalize(&mut self) {
        let rules = self
            .general
            .rules
            .iter_mut()
            .chain(self.signatures.iter_mut().flat_map(|s| s.rules.iter_mut()));
        for rule in rules {
            let normalized = normalize_pattern(&rule.pattern);
            if normalized != rule.pattern {
                debug!("Pattern '{}' normalized to '{}'", rule.pattern, normalized);
            }
            rule.pattern = normalized;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for signature in &self.signatures {
            if signature.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "signature with an empty name".to_string(),
                ));
            }
            if !names.insert(signature.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "signature '{}' is declared more than once",
                    signature.name
                )));
            }
        }
        let rules = self
            .general
            .rules
            .iter()
            .chain(self.signatures.iter().flat_map(|s| s.rules.iter()));
        for rule in rules {
            validate_pattern(&rule.pattern)?;
        }
        Ok(())
    }
}

/// Rewrites both `\` and `/` to the host separator and drops leading
/// separators, so documents written on any platform work on every platform.
pub fn normalize_pattern(pattern: &str) -> String {
    let replaced: String = pattern
        .chars()
        .map(|c| if c == '\\' || c == '/' { MAIN_SEPARATOR } else { c })
        .collect();
    replaced.trim_start_matches(MAIN_SEPARATOR).to_string()
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::Invalid("empty pattern".to_string()));
    }
    if pattern.contains("**") {
        return Err(ConfigError::Invalid(format!(
            "pattern '{pattern}' uses the recursive wildcard '**', which is not supported"
        )));
    }
    glob::Pattern::new(pattern)
        .map_err(|e| ConfigError::Invalid(format!("pattern '{pattern}': {e}")))?;
    Ok(())
}

/// Loads the signature document at `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file is missing, unreadable, not valid TOML,
/// or contains invalid signatures or patterns.
pub fn load(path: &Path) -> Result<SignatureDocument, ConfigError> {
    info!("Reading the signature document");
    debug!("Signature document path is {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let doc = SignatureDocument::from_toml_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    doc.validate()?;
    debug!(
        "Loaded {} global rule(s) and {} signature(s)",
        doc.general.rules.len(),
        doc.signatures.len()
    );
    Ok(doc)
}

/// Loads `primary`, and if that fails for any reason, makes exactly one more
/// attempt at `fallback`.
pub fn load_with_fallback(
    primary: &Path,
    fallback: Option<&Path>,
) -> Result<SignatureDocument, ConfigError> {
    let primary_err = match load(primary) {
        Ok(doc) => return Ok(doc),
        Err(e) => e,
    };
    let Some(fallback) = fallback else {
        return Err(primary_err);
    };
    warn!("{primary_err}. Trying {}", fallback.display());
    load(fallback).map_err(|fallback_err| ConfigError::BothLocationsFailed {
        primary: Box::new(primary_err),
        fallback: Box::new(fallback_err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[general]
[[general.file]]
pattern = "*.log"

[[general.file]]
pattern = "important.log"
ignore = false

[[signature]]
name = "App1"
[[signature.file]]
pattern = "cache"
[[signature.file]]
pattern = "cache\\keep.txt"
ignore = false

[[signature]]
name = "App2"
"#;

    fn sep(s: &str) -> String {
        s.replace('/', &MAIN_SEPARATOR.to_string())
    }

    #[test]
    fn test_parse_sample() {
        let doc = SignatureDocument::from_toml_str(SAMPLE).unwrap();
        assert_eq!(doc.general.rules.len(), 2);
        assert!(doc.general.rules[0].ignore);
        assert!(!doc.general.rules[1].ignore);
        assert_eq!(doc.signatures.len(), 2);
        assert_eq!(doc.signatures[0].rules[1].pattern, sep("cache/keep.txt"));
        assert!(doc.signatures[1].rules.is_empty());
    }

    #[test]
    fn test_ignore_defaults_to_true() {
        let doc =
            SignatureDocument::from_toml_str("[[general.file]]\npattern = \"tmp\"\n").unwrap();
        assert_eq!(doc.general.rules, vec![FileRule::exclude("tmp")]);
        assert!(doc.signatures.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let doc = SignatureDocument::from_toml_str("").unwrap();
        assert_eq!(doc, SignatureDocument::default());
    }

    #[test]
    fn test_normalize_pattern() {
        assert_eq!(normalize_pattern("a\\b/c"), sep("a/b/c"));
        assert_eq!(normalize_pattern("/cache"), "cache");
        assert_eq!(normalize_pattern("\\\\cache\\x"), sep("cache/x"));
        assert_eq!(normalize_pattern("*.log"), "*.log");
    }

    #[test]
    fn test_lookup() {
        let doc = SignatureDocument::from_toml_str(SAMPLE).unwrap();
        assert!(doc.has_application("App1"));
        assert!(!doc.has_application("app1"));
        assert!(!doc.has_application("App3"));

        let (global, specific) = doc.rules_for("App1");
        assert_eq!(global.len(), 2);
        assert_eq!(specific.len(), 2);

        let (global, specific) = doc.rules_for("Unknown");
        assert_eq!(global.len(), 2);
        assert!(specific.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[[signature]\nname = ").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_rejects_duplicate_signature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.toml");
        fs::write(
            &path,
            "[[signature]]\nname = \"A\"\n[[signature]]\nname = \"A\"\n",
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_rejects_recursive_wildcard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.toml");
        fs::write(&path, "[[general.file]]\npattern = \"**/*.log\"\n").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_double_star_is_rejected_anywhere() {
        assert!(validate_pattern("a**b").is_err());
        assert!(glob::Pattern::new("a**b").is_err());
        assert!(validate_pattern(&normalize_pattern("cache/**")).is_err());
        assert!(validate_pattern("a*b").is_ok());
    }

    #[test]
    fn test_load_rejects_bad_glob() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("glob.toml");
        fs::write(&path, "[[general.file]]\npattern = \"[abc\"\n").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_with_fallback() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        let fallback = dir.path().join("fallback.toml");
        fs::write(&fallback, SAMPLE).unwrap();

        let doc = load_with_fallback(&primary, Some(&fallback)).unwrap();
        assert!(doc.has_application("App1"));

        fs::write(&primary, "[[signature]]\nname = \"Primary\"\n").unwrap();
        let doc = load_with_fallback(&primary, Some(&fallback)).unwrap();
        assert!(doc.has_application("Primary"));
        assert!(!doc.has_application("App1"));
    }

    #[test]
    fn test_load_with_fallback_both_fail() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        let fallback = dir.path().join("fallback.toml");
        fs::write(&fallback, "not = [valid").unwrap();

        let err = load_with_fallback(&primary, Some(&fallback)).unwrap_err();
        match err {
            ConfigError::BothLocationsFailed { primary, fallback } => {
                assert!(matches!(*primary, ConfigError::NotFound(_)));
                assert!(matches!(*fallback, ConfigError::Parse { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            load_with_fallback(&primary, None),
            Err(ConfigError::NotFound(_))
        ));
    }
}
