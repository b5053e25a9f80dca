use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the devguide library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// No summarizable files found in directory.
    #[error("No processable files found in '{path}'. Check the exclusion list or file permissions.")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Transport-level failure talking to the completion endpoint.
    #[error("HTTP error: {message}")]
    Http {
        /// Error message
        message: String,
    },

    /// The completion endpoint answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message returned by the endpoint
        message: String,
    },

    /// The completion endpoint answered with a body we could not use.
    #[error("Unexpected response format: {message}")]
    UnexpectedResponse {
        /// Error message
        message: String,
    },

    /// The aggregation response could not be decoded into findings.
    #[error("Malformed findings response: {message}")]
    MalformedFindings {
        /// Why decoding failed
        message: String,
        /// Leading part of the raw response, for diagnostics
        excerpt: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Creates an unexpected response error.
    #[must_use]
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Creates a malformed findings error, keeping a short excerpt of the response.
    #[must_use]
    pub fn malformed_findings(message: impl Into<String>, response: &str) -> Self {
        const EXCERPT_CHARS: usize = 200;

        Self::MalformedFindings {
            message: message.into(),
            excerpt: response.chars().take(EXCERPT_CHARS).collect(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the error came from the completion endpoint.
    #[must_use]
    pub const fn is_api(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Api { .. } | Self::UnexpectedResponse { .. }
        )
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::Template {
            template: "unknown".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
        }
    }
}
