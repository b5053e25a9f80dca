use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class", "sqlite", "db",
    ]
    .into_iter()
    .collect()
});

/// A source file discovered during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root, as sent to the model
    pub path: String,

    /// Absolute path on disk
    pub absolute_path: PathBuf,

    /// UTF-8 file contents
    pub contents: String,
}

impl SourceFile {
    /// Creates a new source file.
    #[must_use]
    pub fn new(path: impl Into<String>, absolute_path: PathBuf, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            absolute_path,
            contents: contents.into(),
        }
    }

    /// Returns the `(path, contents)` pair.
    #[must_use]
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.path, &self.contents)
    }

    /// Returns the relative directory containing this file, `.` for the root.
    #[must_use]
    pub fn directory(&self) -> String {
        Path::new(&self.path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string())
    }

    /// Returns the file name component of the relative path.
    #[must_use]
    pub fn file_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map_or_else(|| self.path.clone(), |n| n.to_string_lossy().to_string())
    }

    /// Returns the number of lines in the file.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.contents.lines().count()
    }
}

/// Reads a file as UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::InvalidUtf8`] for non UTF-8 content and [`Error::Io`]
/// for any other read failure.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Checks for null bytes (binary indicator)
/// 3. Calculates the ratio of ASCII characters
/// 4. Files with null bytes or low ASCII ratio are considered binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // Non-ASCII text is still text if it decodes
    match std::str::from_utf8(sample) {
        Ok(_) => return Ok(false),
        // The sample stops partway through a multi-byte character
        Err(e) if e.error_len().is_none() => return Ok(false),
        Err(_) => {}
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}
