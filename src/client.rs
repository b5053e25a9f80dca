//! Completion endpoint client.
//!
//! Every stage talks to the model through [`CompletionClient`]. The shipped
//! implementation, [`AnthropicClient`], performs one blocking HTTP request per
//! call against the Messages API; failures are returned as-is and never retried.

use crate::config::{ApiKey, Config};
use crate::error::{Error, Result};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};
use url::Url;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "v1/messages";

/// The purpose of a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Summary of a single source file
    File,
    /// Summary of a directory from its file summaries
    Directory,
    /// Main language and purpose of the whole project
    Overview,
    /// Structured topic breakdown of all summaries
    Findings,
    /// The final markdown developer guide
    Guide,
}

impl PromptKind {
    /// Returns the name of the template used for this kind.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Overview => "overview",
            Self::Findings => "findings",
            Self::Guide => "guide",
        }
    }
}

/// A single prompt sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// What the request is for
    pub kind: PromptKind,
    /// System prompt
    pub system: String,
    /// User message
    pub prompt: String,
}

/// A hosted text completion service.
pub trait CompletionClient {
    /// Sends one prompt and returns the generated text.
    ///
    /// # Errors
    ///
    /// Any transport, status or decoding failure.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: HttpClient,
    endpoint: Url,
    api_key: ApiKey,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("Invalid base URL '{}': {e}", config.base_url)))?;

        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let endpoint = base
            .join(MESSAGES_PATH)
            .map_err(|e| Error::config(format!("Invalid base URL '{}': {e}", config.base_url)))?;

        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// The full URL requests are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl CompletionClient for AnthropicClient {
    #[instrument(skip(self, request), fields(kind = ?request.kind), level = "debug")]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: [TextBlock {
                    kind: "text",
                    text: &request.prompt,
                }],
            }],
        };

        debug!("Sending completion request to {}", self.endpoint);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()?;

        let status = response.status();
        let response_text = response.text()?;

        if !status.is_success() {
            error!("API error: {} - {}", status, response_text);
            let message = serde_json::from_str::<ErrorEnvelope>(&response_text)
                .map(|e| e.error.message)
                .unwrap_or(response_text);

            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse response: {}", e);
            Error::unexpected_response(format!("Failed to parse response: {e}"))
        })?;

        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            warn!(
                "{:?} response was cut off at max_tokens ({})",
                request.kind, self.max_tokens
            );
        }

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(Error::unexpected_response("response contained no text"));
        }

        Ok(text)
    }
}
