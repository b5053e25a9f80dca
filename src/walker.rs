use crate::{
    config::Config,
    error::{Error, Result},
    file::{has_binary_extension, is_likely_binary, read_text, SourceFile},
    filter::ExclusionFilter,
    writer::Artifacts,
};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

/// Counters collected while walking.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Files yielded to the caller
    pub files: usize,

    /// Entries pruned by exclusion rules; a pruned directory counts once
    pub excluded: usize,

    /// Binary files skipped
    pub binary: usize,

    /// Files skipped for exceeding the size ceiling
    pub oversized: usize,

    /// Entries that could not be read
    pub errors: usize,
}

impl WalkStats {
    /// Total number of entries seen but not yielded.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.excluded + self.binary + self.oversized + self.errors
    }
}

/// Traverses a project tree according to the configured exclusions.
#[derive(Debug, Clone)]
pub struct Walker {
    root_dir: PathBuf,
    output_dir: PathBuf,
    filter: ExclusionFilter,
    respect_gitignore: bool,
    max_file_bytes: Option<u64>,
}

impl Walker {
    /// Creates a new walker from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclusion pattern is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root_dir: config.root_dir.clone(),
            output_dir: config.output_dir.clone(),
            filter: ExclusionFilter::new(&config.exclusions)?,
            respect_gitignore: config.respect_gitignore,
            max_file_bytes: config.max_file_bytes,
        })
    }

    /// Starts a walk of the root directory.
    ///
    /// The returned iterator is lazy: files are read one at a time as it
    /// advances, and it cannot be restarted.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the root does not exist, is not a directory
    /// or cannot be listed.
    pub fn walk(&self) -> Result<Walk> {
        let metadata = fs::metadata(&self.root_dir).map_err(|e| Error::io(&self.root_dir, e))?;

        if !metadata.is_dir() {
            return Err(Error::Io {
                path: self.root_dir.clone(),
                message: "not a directory".to_string(),
            });
        }

        fs::read_dir(&self.root_dir).map_err(|e| Error::io(&self.root_dir, e))?;

        debug!("Starting walk of {}", self.root_dir.display());

        let mut builder = WalkBuilder::new(&self.root_dir);
        builder
            .standard_filters(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let pruned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pruned);
        let filter = self.filter.clone();
        let artifact_dir = self.artifact_dir();

        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }

            if filter.is_excluded_name(entry.file_name()) {
                counter.fetch_add(1, Ordering::Relaxed);
                return false;
            }

            // Output of earlier runs is not project source
            let is_artifact = artifact_dir.as_deref().is_some_and(|dir| {
                entry.path().parent() == Some(dir) && Artifacts::is_artifact_name(entry.file_name())
            });
            if is_artifact {
                trace!("Skipping earlier output: {}", entry.path().display());
            }
            !is_artifact
        });

        Ok(Walk {
            inner: builder.build(),
            root_dir: self.root_dir.clone(),
            filter: self.filter.clone(),
            max_file_bytes: self.max_file_bytes,
            pruned,
            stats: WalkStats::default(),
        })
    }

    /// The output directory expressed under the walk root, if it lies inside it.
    ///
    /// An output directory that does not exist yet holds no artifacts.
    fn artifact_dir(&self) -> Option<PathBuf> {
        let root = fs::canonicalize(&self.root_dir).ok()?;
        let output = fs::canonicalize(&self.output_dir).ok()?;
        let relative = output.strip_prefix(&root).ok()?;

        Some(self.root_dir.join(relative))
    }
}

/// Lazy iterator over the source files of a project.
pub struct Walk {
    inner: ignore::Walk,
    root_dir: PathBuf,
    filter: ExclusionFilter,
    max_file_bytes: Option<u64>,
    pruned: Arc<AtomicUsize>,
    stats: WalkStats,
}

impl Walk {
    /// Returns the counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> WalkStats {
        WalkStats {
            excluded: self.stats.excluded + self.pruned.load(Ordering::Relaxed),
            ..self.stats
        }
    }

    /// Root directory being walked.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn load(&mut self, path: &Path, relative: String) -> Result<Option<SourceFile>> {
        trace!("Processing file: {}", relative);

        if has_binary_extension(path) {
            debug!("Skipping binary file (by extension): {}", relative);
            self.stats.binary += 1;
            return Ok(None);
        }

        if let Some(limit) = self.max_file_bytes {
            let size = fs::metadata(path).map_err(|e| Error::io(path, e))?.len();
            if size > limit {
                warn!("Skipping {} ({} bytes exceeds limit of {})", relative, size, limit);
                self.stats.oversized += 1;
                return Ok(None);
            }
        }

        if is_likely_binary(path)? {
            debug!("Skipping binary file (by content): {}", relative);
            self.stats.binary += 1;
            return Ok(None);
        }

        let contents = read_text(path)?;
        Ok(Some(SourceFile::new(relative, path.to_path_buf(), contents)))
    }
}

impl Iterator for Walk {
    type Item = SourceFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    self.stats.errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let relative = pathdiff::diff_paths(path, &self.root_dir)
                .unwrap_or_else(|| path.to_path_buf());

            if !self.filter.should_process(&relative) {
                trace!("Excluded: {}", relative.display());
                self.stats.excluded += 1;
                continue;
            }

            match self.load(path, normalize(&relative)) {
                Ok(Some(file)) => {
                    self.stats.files += 1;
                    return Some(file);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", path.display(), e);
                    self.stats.errors += 1;
                }
            }
        }
    }
}

/// Renders a relative path with `/` separators regardless of platform.
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ExclusionConfig;
    use assert_fs::prelude::*;

    fn create_test_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .api_key("test-key")
            .build()
            .unwrap()
    }

    fn walk_pairs(config: &Config) -> Vec<(String, String)> {
        Walker::new(config)
            .unwrap()
            .walk()
            .unwrap()
            .map(|f| (f.path, f.contents))
            .collect()
    }

    #[test]
    fn test_single_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("hello").unwrap();

        let pairs = walk_pairs(&create_test_config(temp.path()));

        assert_eq!(pairs, vec![("a.txt".to_string(), "hello".to_string())]);
    }

    #[test]
    fn test_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        let pairs = walk_pairs(&create_test_config(temp.path()));

        assert!(pairs.is_empty());
    }

    #[test]
    fn test_only_excluded_content_is_empty() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".git/HEAD").write_str("ref: refs/heads/main").unwrap();
        temp.child("node_modules/x/index.js").write_str("module.exports = 1").unwrap();

        let pairs = walk_pairs(&create_test_config(temp.path()));

        assert!(pairs.is_empty());
    }

    #[test]
    fn test_excluded_names_never_appear_at_any_depth() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child(".git/config").write_str("[core]").unwrap();
        temp.child("vendor/lib/.git/HEAD").write_str("ref").unwrap();
        temp.child("a/b/c/__pycache__/m.py").write_str("x = 1").unwrap();
        temp.child("deploy/Dockerfile").write_str("FROM scratch").unwrap();

        let pairs = walk_pairs(&create_test_config(temp.path()));
        let paths: Vec<_> = pairs.iter().map(|(p, _)| p.as_str()).collect();

        assert_eq!(paths, vec!["src/main.rs"]);
        for (path, _) in &pairs {
            assert!(!path.split('/').any(|c| c == ".git" || c == "__pycache__"));
        }
    }

    #[test]
    fn test_deterministic_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.rs").write_str("b").unwrap();
        temp.child("a.rs").write_str("a").unwrap();
        temp.child("src/z.rs").write_str("z").unwrap();
        temp.child("src/m.rs").write_str("m").unwrap();

        let pairs = walk_pairs(&create_test_config(temp.path()));
        let paths: Vec<_> = pairs.iter().map(|(p, _)| p.as_str()).collect();

        assert_eq!(paths, vec!["a.rs", "b.rs", "src/m.rs", "src/z.rs"]);
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let config = create_test_config(Path::new("/nonexistent/path/that/should/not/exist"));
        let err = Walker::new(&config).unwrap().walk().err().unwrap();

        assert!(err.is_io());
    }

    #[test]
    fn test_root_is_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("file.txt");
        file.write_str("x").unwrap();

        let err = Walker::new(&create_test_config(file.path()))
            .unwrap()
            .walk()
            .err()
            .unwrap();

        assert!(err.is_io());
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("good.txt").write_str("fine").unwrap();
        // Passes the binary sniff, fails UTF-8 decoding
        temp.child("bad.txt")
            .write_binary(b"let greeting = \"caf\xe9\"; // latin-1 leftover\n")
            .unwrap();

        let config = create_test_config(temp.path());
        let mut walk = Walker::new(&config).unwrap().walk().unwrap();
        let files: Vec<_> = walk.by_ref().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "good.txt");
        assert_eq!(walk.stats().files, 1);
        assert_eq!(walk.stats().errors, 1);
        assert_eq!(walk.stats().binary, 0);
        assert_eq!(walk.stats().skipped(), 1);
    }

    #[test]
    fn test_non_ascii_text_larger_than_sniff_buffer() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("hello").unwrap();
        let cyrillic = format!("x{}", "ж".repeat(6000));
        temp.child("ru.txt").write_str(&cyrillic).unwrap();

        let config = create_test_config(temp.path());
        let mut walk = Walker::new(&config).unwrap().walk().unwrap();
        let files: Vec<_> = walk.by_ref().collect();

        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, "ru.txt");
        assert_eq!(files[1].contents, cyrillic);
        assert_eq!(walk.stats().binary, 0);
    }

    #[test]
    fn test_pruned_entries_are_counted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child(".git/HEAD").write_str("ref").unwrap();
        temp.child("src/node_modules/x.js").write_str("x").unwrap();
        temp.child("Dockerfile").write_str("FROM scratch").unwrap();

        let config = create_test_config(temp.path());
        let mut walk = Walker::new(&config).unwrap().walk().unwrap();
        let files: Vec<_> = walk.by_ref().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(walk.stats().excluded, 3);
        assert_eq!(walk.stats().skipped(), 3);
    }

    #[test]
    fn test_artifacts_in_output_dir_are_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("hello").unwrap();
        temp.child("guides/initial-summaries_20250102_030405.txt").write_str("s").unwrap();
        temp.child("guides/guidebook_20250102_030405.md").write_str("# g").unwrap();
        temp.child("guides/findings/20250102_030405/findings.json").write_str("{}").unwrap();
        temp.child("guides/notes.md").write_str("kept").unwrap();
        // Same names outside the output directory are project files
        temp.child("docs/guidebook_intro.md").write_str("# intro").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .output_dir(temp.path().join("guides"))
            .api_key("test-key")
            .build()
            .unwrap();

        let paths: Vec<_> = walk_pairs(&config).into_iter().map(|(p, _)| p).collect();

        assert_eq!(paths, vec!["a.txt", "docs/guidebook_intro.md", "guides/notes.md"]);
    }

    #[test]
    fn test_binary_files_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("text.rs").write_str("fn main() {}").unwrap();
        temp.child("logo.png").write_binary(&[0x89, 0x50, 0x4e, 0x47]).unwrap();
        temp.child("blob").write_binary(&[0u8; 64]).unwrap();

        let config = create_test_config(temp.path());
        let mut walk = Walker::new(&config).unwrap().walk().unwrap();
        let files: Vec<_> = walk.by_ref().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(walk.stats().binary, 2);
    }

    #[test]
    fn test_oversized_files_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("small.txt").write_str("tiny").unwrap();
        temp.child("large.txt").write_str(&"x".repeat(2048)).unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("test-key")
            .max_file_bytes(1024)
            .build()
            .unwrap();

        let mut walk = Walker::new(&config).unwrap().walk().unwrap();
        let files: Vec<_> = walk.by_ref().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "small.txt");
        assert_eq!(walk.stats().oversized, 1);
    }

    #[test]
    fn test_file_glob_exclusions() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("Cargo.toml").write_str("[package]").unwrap();
        temp.child("Cargo.lock").write_str("# lock").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("test-key")
            .exclusions(ExclusionConfig::default().exclude_files(vec!["*.lock".to_string()]))
            .build()
            .unwrap();

        let pairs = walk_pairs(&config);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "Cargo.toml");
    }

    #[test]
    fn test_gitignore_only_when_enabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored.rs\n").unwrap();
        temp.child("included.rs").write_str("fn main() {}").unwrap();
        temp.child("ignored.rs").write_str("fn test() {}").unwrap();

        let without = walk_pairs(&create_test_config(temp.path()));
        assert_eq!(without.len(), 3);

        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("test-key")
            .respect_gitignore(true)
            .build()
            .unwrap();
        let with: Vec<_> = walk_pairs(&config).into_iter().map(|(p, _)| p).collect();

        assert_eq!(with, vec![".gitignore".to_string(), "included.rs".to_string()]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./src/lib.rs")), "src/lib.rs");
        assert_eq!(normalize(Path::new("a.txt")), "a.txt");
    }
}
