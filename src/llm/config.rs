//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// Default OpenRouter candidates, tried in this order.
pub const DEFAULT_OPENROUTER_MODELS: &[&str] = &[
    "meta-llama/llama-3.3-70b-instruct:free",
    "google/gemini-2.0-flash-exp:free",
    "nvidia/nemotron-3-nano-30b-a3b:free",
    "google/gemma-3-27b-it:free",
    "qwen/qwen3-235b-a22b-thinking:free",
    "stepfun/step-3.5-flash:free",
    "openrouter/pony-alpha:free",
    "z-ai/glm-4.7",
    "xiaomi/xiaomi-mimo-v2-flash:free",
    "deepseek/deepseek-r1-0528:free",
];

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenRouter chat completions (OpenAI-compatible), default
    #[default]
    OpenRouter,
    /// Google Gemini generateContent API
    Gemini,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openrouter" => Some(Self::OpenRouter),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Gemini => "gemini",
        }
    }

    /// Default API endpoint for this provider.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenRouter => OPENROUTER_ENDPOINT,
            Self::Gemini => GEMINI_ENDPOINT,
        }
    }

    /// Default candidate models for this provider.
    pub fn default_models(&self) -> Vec<String> {
        match self {
            Self::OpenRouter => DEFAULT_OPENROUTER_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            Self::Gemini => vec![DEFAULT_GEMINI_MODEL.to_string()],
        }
    }

    /// Provider-specific API key variable.
    fn key_env_var(&self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Configuration for the analysis client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider to call (openrouter or gemini)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint; empty means the provider default
    #[serde(default)]
    pub endpoint: String,
    /// API credential
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Candidate models in fallback order; empty means the provider defaults
    #[serde(default)]
    pub models: Vec<String>,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum transcript characters sent upstream
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
    /// Per-call timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Referer sent to OpenRouter for attribution
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Title sent to OpenRouter for attribution
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_transcript_chars() -> usize {
    100_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_title() -> String {
    "Research Portal".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Base default without env overrides.
    pub fn base_default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: String::new(),
            api_key: None,
            models: Vec::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_transcript_chars: default_max_transcript_chars(),
            request_timeout_secs: default_request_timeout_secs(),
            app_url: default_app_url(),
            app_title: default_app_title(),
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "openrouter" (default) or "gemini"
    /// - `LLM_ENDPOINT`: API endpoint
    /// - `LLM_API_KEY`: API key for any provider
    /// - `OPENROUTER_API_KEY` / `GEMINI_API_KEY`: provider-specific key
    /// - `LLM_MODELS`: comma-separated candidate list
    /// - `LLM_MAX_TOKENS`: Maximum tokens in response
    /// - `LLM_TEMPERATURE`: Generation temperature
    /// - `LLM_MAX_TRANSCRIPT_CHARS`: Max transcript chars to send
    /// - `LLM_REQUEST_TIMEOUT_SECS`: Per-call timeout
    /// - `APP_URL`: Referer sent to OpenRouter
    ///
    /// `LLM_API_KEY` wins over the provider-specific variable.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    pub(crate) fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = var("LLM_PROVIDER").and_then(|v| LlmProvider::from_str(&v)) {
            self.provider = provider;
        }

        if let Some(endpoint) = var("LLM_ENDPOINT") {
            self.endpoint = endpoint;
        }

        if let Some(key) = var("LLM_API_KEY").or_else(|| var(self.provider.key_env_var())) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Some(models) = var("LLM_MODELS") {
            let parsed: Vec<String> = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.models = parsed;
            }
        }

        if let Some(val) = var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = val;
        }
        if let Some(val) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = val;
        }
        if let Some(val) = var("LLM_MAX_TRANSCRIPT_CHARS").and_then(|v| v.parse().ok()) {
            self.max_transcript_chars = val;
        }
        if let Some(val) = var("LLM_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = val;
        }
        if let Some(url) = var("APP_URL") {
            self.app_url = url;
        }
    }

    /// Endpoint to call, falling back to the provider default.
    pub fn endpoint(&self) -> &str {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint()
        } else {
            self.endpoint.trim_end_matches('/')
        }
    }

    /// Candidate models in fallback order.
    pub fn candidate_models(&self) -> Vec<String> {
        if self.models.is_empty() {
            self.provider.default_models()
        } else {
            self.models.clone()
        }
    }

    /// The configured credential, if it is non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
