/// OpenAI HTTP client module.
///
/// This module provides a blocking HTTP client for the OpenAI chat-completions API,
/// with explicit construction-time configuration and timeout handling.
mod client;

pub use client::{
    API_KEY_VAR, BASE_URL_VAR, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SEED, DEFAULT_TIMEOUT,
    MODEL_VAR, OpenAiClient, OpenAiClientBuilder, OpenAiError, VisionClientTrait,
};
