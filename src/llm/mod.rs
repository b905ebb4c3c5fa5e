//! LLM analysis of earnings-call transcripts.
//!
//! An [`AnalysisClient`] walks an ordered list of candidate models on one
//! [`CompletionProvider`], keeping the first reply that yields a valid
//! analysis. Supported providers are OpenRouter (default) and Gemini.

mod client;
mod config;
mod gemini;
mod json;
mod openrouter;
mod prompts;

use async_trait::async_trait;
use thiserror::Error;

pub use client::AnalysisClient;
#[cfg(test)]
pub(crate) use client::testing;
pub use config::{LlmConfig, LlmProvider, DEFAULT_OPENROUTER_MODELS};
pub use gemini::GeminiProvider;
pub use json::{extract_json_object, parse_analysis};
pub use openrouter::OpenRouterProvider;
pub use prompts::{build_analysis_prompt, truncate_transcript, ANALYSIS_SYSTEM_PROMPT};

/// LLM client errors.
///
/// `Configuration` and `InvalidInput` abort an analysis outright. The rest
/// describe a single model call and only advance the fallback loop.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether the error is about the request itself rather than one model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidInput(_))
    }
}

/// One prompt to send to a model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-style completion API that can serve several models.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Run `request` against `model` and return the raw text reply.
    async fn complete(&self, model: &str, request: &CompletionRequest)
        -> Result<String, LlmError>;
}
