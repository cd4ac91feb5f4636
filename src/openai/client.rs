/// OpenAI HTTP client implementation.
///
/// This module provides `OpenAiClient` for making synchronous chat-completion requests
/// carrying a receipt image, along with error types and the builder that holds the
/// client configuration.
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::source::ReceiptImage;

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
/// Environment variable overriding the model name.
pub const MODEL_VAR: &str = "OPENAI_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SEED: u64 = 43;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the OpenAI API.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status, with the API's error message when one was returned
    #[error("HTTP error: status {status}: {message}")]
    Http { status: u16, message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Response envelope lacked the expected content
    #[error("OpenAI API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No API key was configured
    #[error("Missing API credential: {0} is not set")]
    MissingCredential(&'static str),
}

impl OpenAiError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }
}

/// Builder for constructing `OpenAiClient` instances.
///
/// The builder is the run's configuration object: every setting the client uses
/// is fixed here at construction time.
///
/// # Examples
///
/// ```
/// use receipts::openai::OpenAiClientBuilder;
///
/// let client = OpenAiClientBuilder::new()
///     .api_key("sk-test")
///     .base_url("http://localhost:8080/v1")
///     .model("gpt-4.1-mini")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "gpt-4.1-mini");
/// ```
#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
    seed: Option<u64>,
}

impl OpenAiClientBuilder {
    /// Creates a new `OpenAiClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key used for bearer authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL for the API (e.g., "https://api.openai.com/v1").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name used for every request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the sampling seed sent with each request.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the `OpenAiClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// Values not set on the builder are read from `OPENAI_API_KEY`,
    /// `OPENAI_BASE_URL` and `OPENAI_MODEL`. The base URL defaults to
    /// `https://api.openai.com/v1` and the model to `gpt-4.1-mini`.
    ///
    /// # Errors
    ///
    /// Returns `OpenAiError::MissingCredential` if no non-blank API key is available,
    /// or `OpenAiError::InvalidUrl` if the base URL does not parse.
    pub fn build(self) -> Result<OpenAiClient, OpenAiError> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_VAR).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or(OpenAiError::MissingCredential(API_KEY_VAR))?;

        let base_url = self
            .base_url
            .or_else(|| std::env::var(BASE_URL_VAR).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let model = self
            .model
            .or_else(|| std::env::var(MODEL_VAR).ok())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        reqwest::Url::parse(&base_url)
            .map_err(|e| OpenAiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(OpenAiError::Network)?;

        Ok(OpenAiClient {
            client,
            api_key,
            base_url,
            model,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        })
    }
}

/// Synchronous client for the OpenAI chat-completions API.
///
/// Each call issues exactly one request; nothing is cached or retried.
/// Construct it with `OpenAiClientBuilder`.
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    seed: u64,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Trait for vision-capable model clients.
///
/// This seam lets extraction logic be tested against canned replies.
pub trait VisionClientTrait: Send + Sync {
    /// Sends a text prompt together with one image and returns the model's text reply.
    fn complete(&self, prompt: &str, image: &ReceiptImage) -> Result<String, OpenAiError>;
}

impl OpenAiClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn complete_internal(&self, prompt: &str, image: &ReceiptImage) -> Result<String, OpenAiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = request_body(&self.model, self.seed, prompt, &image.to_data_url());

        debug!(
            "Requesting extraction for {} ({} bytes) from {}",
            image.file_name,
            image.bytes.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(OpenAiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .map(|text| error_message(&text))
                .unwrap_or_default();
            return Err(OpenAiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().map_err(OpenAiError::from_reqwest)?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(OpenAiError::Serialization)?;
        message_content(&json)
    }
}

impl VisionClientTrait for OpenAiClient {
    fn complete(&self, prompt: &str, image: &ReceiptImage) -> Result<String, OpenAiError> {
        self.complete_internal(prompt, image)
    }
}

/// Builds the chat-completions request body for one image.
fn request_body(model: &str, seed: u64, prompt: &str, data_url: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "seed": seed,
        "response_format": { "type": "json_object" },
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }
        ]
    })
}

/// Extracts `choices[0].message.content` from a chat-completions response.
fn message_content(json: &serde_json::Value) -> Result<String, OpenAiError> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| OpenAiError::Api {
            message: "Missing 'choices[0].message.content' in API response".to_string(),
        })
}

/// Pulls `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
