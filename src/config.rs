use crate::error::{Error, Result};
use crate::filter::ExclusionConfig;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variable naming the project to analyze.
pub const ENV_TARGET_DIR: &str = "GUIDE_TARGET_PROJECT_DIRECTORY";
/// Environment variable carrying the completion API credential.
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Environment variable overriding the completion API base URL.
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
/// Environment variable naming the directory artifacts are written to.
pub const ENV_OUTPUT_DIR: &str = "GUIDE_OUTPUT_DIRECTORY";
/// Environment variable overriding the model name.
pub const ENV_MODEL: &str = "GUIDE_MODEL";
/// Environment variable overriding the per-response token limit.
pub const ENV_MAX_TOKENS: &str = "GUIDE_MAX_TOKENS";
/// Environment variable selecting the language the guide is written in.
pub const ENV_LANGUAGE: &str = "GUIDE_LANGUAGE";
/// Environment variable with comma-separated names appended to the exclusion list.
pub const ENV_EXCLUDE: &str = "GUIDE_EXCLUDE";

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/";
pub(crate) const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LANGUAGE: &str = "English";
const DEFAULT_CONTEXT_TOKENS: usize = 200_000;

/// API credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a raw credential.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw credential for use in request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Configuration for a guide generation run.
///
/// Built once at startup, either through [`Config::builder()`] or
/// [`Config::from_env()`], and passed by reference to every stage.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory of the project to analyze
    pub root_dir: PathBuf,

    /// Directory the three run artifacts are written to
    pub output_dir: PathBuf,

    /// Completion API credential
    pub api_key: ApiKey,

    /// Base URL of the completion API
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Maximum tokens the model may generate per response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout applied to each completion request
    pub request_timeout: Duration,

    /// Natural language the summaries and guide are written in
    pub language: String,

    /// Names and file patterns skipped during traversal
    pub exclusions: ExclusionConfig,

    /// Honor `.gitignore` files found in the project
    pub respect_gitignore: bool,

    /// Files larger than this many bytes are skipped
    pub max_file_bytes: Option<u64>,

    /// Prompt size (estimated tokens) above which a warning is logged
    pub context_tokens: usize,

    /// Issue one summary request per directory after the file pass
    pub summarize_directories: bool,

    /// Walk and report only; no completion calls, no artifacts
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use devguide::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./my-project")
    ///     .api_key("sk-test")
    ///     .build()
    ///     .expect("valid configuration");
    /// assert_eq!(config.max_tokens, 8192);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required variable is missing or
    /// an optional one cannot be parsed. The filesystem is not touched.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let root_dir = get(ENV_TARGET_DIR)
            .ok_or_else(|| Error::config(format!("{ENV_TARGET_DIR} environment variable is not set")))?;
        let api_key = get(ENV_API_KEY)
            .ok_or_else(|| Error::config(format!("{ENV_API_KEY} environment variable is not set")))?;

        let mut builder = Self::builder().root_dir(root_dir).api_key(api_key);

        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            builder = builder.output_dir(dir);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            builder = builder.base_url(url);
        }
        if let Some(model) = get(ENV_MODEL) {
            builder = builder.model(model);
        }
        if let Some(raw) = get(ENV_MAX_TOKENS) {
            let tokens = raw.parse::<u32>().map_err(|e| {
                Error::config(format!("{ENV_MAX_TOKENS} must be a positive integer, got '{raw}': {e}"))
            })?;
            builder = builder.max_tokens(tokens);
        }
        if let Some(language) = get(ENV_LANGUAGE) {
            builder = builder.language(language);
        }
        if let Some(names) = get(ENV_EXCLUDE) {
            builder = builder.exclusions(ExclusionConfig::default().with_names(split_list(&names)));
        }

        builder.build()
    }

    /// Validates the configuration.
    ///
    /// Only the values themselves are checked; whether the root directory
    /// exists is decided when the walk starts.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The credential or model is empty
    /// - The base URL does not parse
    /// - Token limits are zero
    /// - Temperature is outside `0.0..=1.0`
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::config("root_dir must not be empty"));
        }

        if self.api_key.expose().trim().is_empty() {
            return Err(Error::config("api_key must not be empty"));
        }

        Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("Invalid base URL '{}': {e}", self.base_url)))?;

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }

        if self.context_tokens == 0 {
            return Err(Error::config("context_tokens must be greater than 0"));
        }

        if self.language.trim().is_empty() {
            return Err(Error::config("language must not be empty"));
        }

        if self.max_file_bytes == Some(0) {
            return Err(Error::config("max_file_bytes must be greater than 0 when set"));
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    request_timeout: Option<Duration>,
    language: Option<String>,
    exclusions: Option<ExclusionConfig>,
    respect_gitignore: bool,
    max_file_bytes: Option<u64>,
    context_tokens: Option<usize>,
    summarize_directories: Option<bool>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the project directory to analyze.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the directory artifacts are written to.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the completion API credential.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the completion API base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum tokens per response.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the language summaries and the guide are written in.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the exclusion configuration.
    #[must_use]
    pub fn exclusions(mut self, exclusions: ExclusionConfig) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = enabled;
        self
    }

    /// Skips files larger than `bytes`.
    #[must_use]
    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = Some(bytes);
        self
    }

    /// Sets the prompt size warning threshold in estimated tokens.
    #[must_use]
    pub fn context_tokens(mut self, tokens: usize) -> Self {
        self.context_tokens = Some(tokens);
        self
    }

    /// Enables or disables per-directory summaries.
    #[must_use]
    pub fn summarize_directories(mut self, enabled: bool) -> Self {
        self.summarize_directories = Some(enabled);
        self
    }

    /// Enables dry run mode (no completion calls, no artifacts).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory or credential is missing,
    /// or if validation fails.
    pub fn build(self) -> Result<Config> {
        let root_dir = self
            .root_dir
            .ok_or_else(|| Error::config("root_dir is required"))?;
        let api_key = self
            .api_key
            .ok_or_else(|| Error::config("api_key is required"))?;

        let config = Config {
            root_dir,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            api_key: ApiKey::new(api_key),
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            language: self
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            exclusions: self.exclusions.unwrap_or_default(),
            respect_gitignore: self.respect_gitignore,
            max_file_bytes: self.max_file_bytes,
            context_tokens: self.context_tokens.unwrap_or(DEFAULT_CONTEXT_TOKENS),
            summarize_directories: self.summarize_directories.unwrap_or(true),
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}
