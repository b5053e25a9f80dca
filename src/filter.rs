//! Path exclusion rules applied during traversal.
//!
//! Names are matched exactly against every path component, so an entry such
//! as `.git` hides that directory at any depth. Optional glob patterns are
//! matched against the path relative to the project root.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

/// Names skipped by default.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".git",
    ".venv",
    "node_modules",
    "__pycache__",
    ".DS_Store",
    "pb_data",
    "pb_public",
    "migrations",
    ".idea",
    "k8s",
    "olt",
    "venv",
    "compose.yaml",
    "Dockerfile",
    "images",
    "data",
];

/// Configuration for path exclusion.
#[derive(Debug, Clone)]
pub struct ExclusionConfig {
    names: Vec<String>,
    file_patterns: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_string()).collect(),
            file_patterns: Vec::new(),
        }
    }
}

impl ExclusionConfig {
    /// Creates a configuration that excludes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            file_patterns: Vec::new(),
        }
    }

    /// Appends exact names to the exclusion list.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets glob patterns matched against relative file paths.
    #[must_use]
    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.file_patterns = patterns;
        self
    }

    /// Returns the exact names being excluded.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the file glob patterns.
    #[must_use]
    pub fn file_patterns(&self) -> &[String] {
        &self.file_patterns
    }
}

/// Compiled form of [`ExclusionConfig`].
#[derive(Debug, Clone)]
pub(crate) struct ExclusionFilter {
    names: HashSet<String>,
    file_globs: GlobSet,
}

impl ExclusionFilter {
    /// Compiles the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a glob pattern is invalid.
    pub(crate) fn new(config: &ExclusionConfig) -> Result<Self> {
        Ok(Self {
            names: config.names.iter().cloned().collect(),
            file_globs: Self::build_globset(&config.file_patterns)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if an entry with this file name must be pruned.
    pub(crate) fn is_excluded_name(&self, name: &OsStr) -> bool {
        name.to_str().is_some_and(|n| self.names.contains(n))
    }

    /// Returns true if a file at this root-relative path should be summarized.
    pub(crate) fn should_process(&self, relative: &Path) -> bool {
        if relative
            .components()
            .any(|c| self.is_excluded_name(c.as_os_str()))
        {
            return false;
        }

        !self.file_globs.is_match(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_excluded() {
        let filter = ExclusionFilter::new(&ExclusionConfig::default()).unwrap();

        assert!(filter.is_excluded_name(OsStr::new(".git")));
        assert!(filter.is_excluded_name(OsStr::new("node_modules")));
        assert!(!filter.is_excluded_name(OsStr::new("src")));
    }

    #[test]
    fn test_exact_match_only() {
        let filter = ExclusionFilter::new(&ExclusionConfig::default()).unwrap();

        // "data" is excluded, "database" is not
        assert!(!filter.is_excluded_name(OsStr::new("database")));
        assert!(!filter.is_excluded_name(OsStr::new(".github")));
        assert!(filter.should_process(Path::new("src/database/mod.rs")));
    }

    #[test]
    fn test_nested_component_excluded() {
        let filter = ExclusionFilter::new(&ExclusionConfig::default()).unwrap();

        assert!(!filter.should_process(Path::new("a/b/.git/config")));
        assert!(!filter.should_process(Path::new("web/node_modules/x/index.js")));
        assert!(!filter.should_process(Path::new("deploy/Dockerfile")));
    }

    #[test]
    fn test_extra_names_and_globs() {
        let config = ExclusionConfig::empty()
            .with_names(["target"])
            .exclude_files(vec!["**/*.lock".to_string()]);
        let filter = ExclusionFilter::new(&config).unwrap();

        assert!(!filter.should_process(Path::new("target/debug/app.d")));
        assert!(!filter.should_process(Path::new("Cargo.lock")));
        assert!(filter.should_process(Path::new("src/main.rs")));
        assert!(filter.should_process(Path::new(".git/HEAD")));
    }

    #[test]
    fn test_invalid_glob() {
        let config = ExclusionConfig::empty().exclude_files(vec!["[".to_string()]);
        let err = ExclusionFilter::new(&config).unwrap_err();
        assert!(err.is_config());
    }
}
