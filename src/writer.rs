use crate::{
    error::{Error, Result},
    findings::Findings,
    summarizer::SummaryLog,
};
use serde::Serialize;
use std::{
    ffi::OsStr,
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SUMMARIES_PREFIX: &str = "initial-summaries_";
const GUIDEBOOK_PREFIX: &str = "guidebook_";
const FINDINGS_DIR: &str = "findings";

/// Local-time token shared by every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStamp(String);

impl RunStamp {
    /// Stamp for the current local time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Local::now().format(STAMP_FORMAT).to_string())
    }

    /// Stamp with an explicit value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The stamp as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paths of the three artifacts written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    /// Raw summaries, `initial-summaries_<stamp>.txt`
    pub summaries: PathBuf,
    /// Findings JSON, `findings/<stamp>/findings.json`
    pub findings: PathBuf,
    /// Developer guide, `guidebook_<stamp>.md`
    pub guidebook: PathBuf,
}

impl Artifacts {
    /// Artifact locations for a stamp under `output_dir`.
    #[must_use]
    pub fn locate(output_dir: &Path, stamp: &RunStamp) -> Self {
        Self {
            summaries: output_dir.join(format!("{SUMMARIES_PREFIX}{stamp}.txt")),
            findings: output_dir
                .join(FINDINGS_DIR)
                .join(stamp.as_str())
                .join("findings.json"),
            guidebook: output_dir.join(format!("{GUIDEBOOK_PREFIX}{stamp}.md")),
        }
    }

    /// Returns true if `name` is an entry this tool writes directly into an
    /// output directory, including in-flight temporary files.
    #[must_use]
    pub fn is_artifact_name(name: &OsStr) -> bool {
        let Some(name) = name.to_str() else {
            return false;
        };

        name == FINDINGS_DIR
            || name.starts_with(SUMMARIES_PREFIX)
            || name.starts_with(GUIDEBOOK_PREFIX)
    }
}

/// Writes run artifacts with atomic operations.
pub(crate) struct Writer {
    artifacts: Artifacts,
}

impl Writer {
    pub(crate) fn new(output_dir: &Path, stamp: &RunStamp) -> Self {
        Self {
            artifacts: Artifacts::locate(output_dir, stamp),
        }
    }

    pub(crate) const fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Writes the raw summary log.
    pub(crate) fn write_summaries(&self, log: &SummaryLog) -> Result<()> {
        let path = &self.artifacts.summaries;
        Self::write_file_atomic(path, &log.render())?;
        info!("Wrote summaries to {}", path.display());
        Ok(())
    }

    /// Writes the findings record.
    pub(crate) fn write_findings(&self, findings: &Findings) -> Result<()> {
        let path = &self.artifacts.findings;
        Self::write_file_atomic(path, &findings.to_json_pretty()?)?;
        info!("Wrote findings to {}", path.display());
        Ok(())
    }

    /// Writes the developer guide.
    pub(crate) fn write_guidebook(&self, guide: &str) -> Result<()> {
        let path = &self.artifacts.guidebook;
        Self::write_file_atomic(path, guide)?;
        info!("Wrote guidebook to {}", path.display());
        Ok(())
    }

    /// Writes a file atomically.
    ///
    /// # Process
    ///
    /// 1. Creates missing parent directories
    /// 2. Writes content to a temporary sibling file
    /// 3. Syncs the temporary file to disk
    /// 4. Renames it over the target path
    fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let temp_path = path.with_extension("tmp");
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .sync_all()
            .map_err(|e| Error::io(&temp_path, e))?;

        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}
