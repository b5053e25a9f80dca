//! # devguide
//!
//! Generates a developer guide for a source tree with the help of an LLM.
//!
//! ## Features
//!
//! - Deterministic directory walk with name-based exclusions and optional `.gitignore` support
//! - One summary per file, per directory and for the whole project
//! - Structured findings decoded from the model's JSON response
//! - Timestamped, atomically written artifacts
//!
//! ## Quick Start
//!
//! ```no_run
//! use devguide::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my-project")
//!     .output_dir("./guides")
//!     .api_key("sk-ant-...")
//!     .build()?;
//!
//! let report = Pipeline::new(config)?.run()?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Walker**: Lazily yields the text files of the project
//! 2. **Summarizer**: Requests a summary per file, per directory and for the project
//! 3. **Aggregator**: Turns the summaries into structured findings
//! 4. **Renderer**: Turns the findings into a markdown guide
//! 5. **Writer**: Persists the three artifacts under a shared run stamp

#![warn(
    missing_docs,
    rust_2018_idioms,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod file;
mod filter;
mod findings;
mod guide;
mod pipeline;
mod prompts;
mod summarizer;
mod token;
mod walker;
mod writer;

#[cfg(test)]
mod test_support;

pub use client::{AnthropicClient, CompletionClient, CompletionRequest, PromptKind};
pub use config::{
    ApiKey, Config, ConfigBuilder, ENV_API_KEY, ENV_BASE_URL, ENV_EXCLUDE, ENV_LANGUAGE,
    ENV_MAX_TOKENS, ENV_MODEL, ENV_OUTPUT_DIR, ENV_TARGET_DIR,
};
pub use error::{Error, Result};
pub use file::SourceFile;
pub use filter::{DEFAULT_EXCLUSIONS, ExclusionConfig};
pub use findings::{Findings, parse_topics};
pub use pipeline::{Pipeline, RunReport};
pub use summarizer::{Summary, SummaryKind, SummaryLog};
pub use token::{SimpleTokenizer, TokenEstimator};
pub use walker::{Walk, WalkStats, Walker};
pub use writer::{Artifacts, RunStamp};

/// Runs the complete guide generation pipeline against the Messages API.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is inaccessible
/// - No processable files are found
/// - A completion request fails or the findings response is malformed
/// - An artifact cannot be written
///
/// # Examples
///
/// ```no_run
/// use devguide::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// run(Config::from_env()?)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunReport> {
    Pipeline::new(config)?.run()
}
