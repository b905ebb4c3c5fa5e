//! Multi-model analysis client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::gemini::GeminiProvider;
use super::json::parse_analysis;
use super::openrouter::OpenRouterProvider;
use super::prompts::{build_analysis_prompt, truncate_transcript, ANALYSIS_SYSTEM_PROMPT};
use super::{CompletionProvider, CompletionRequest, LlmConfig, LlmError, LlmProvider};
use crate::models::AnalysisResult;

/// Turns transcripts into [`AnalysisResult`]s using an ordered model list.
pub struct AnalysisClient {
    config: LlmConfig,
    provider: Arc<dyn CompletionProvider>,
    call_timeout: Duration,
}

impl AnalysisClient {
    /// Create a client for the provider named in `config`.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let api_key = config.credential().unwrap_or_default().to_string();
        let provider: Arc<dyn CompletionProvider> = match config.provider {
            LlmProvider::OpenRouter => Arc::new(OpenRouterProvider::new(http, &config, &api_key)),
            LlmProvider::Gemini => Arc::new(GeminiProvider::new(http, &config, &api_key)),
        };

        Ok(Self::with_provider(config, provider))
    }

    /// Create a client over an existing provider.
    pub fn with_provider(config: LlmConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let call_timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            config,
            provider,
            call_timeout,
        }
    }

    /// Override the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Longest a single `analyze` call can spend waiting on models.
    pub fn max_run_time(&self) -> Duration {
        self.call_timeout * self.config.candidate_models().len() as u32
    }

    /// Analyze a transcript.
    ///
    /// Models are tried one at a time in configured order and the first
    /// valid analysis wins. If none produces one, the placeholder from
    /// [`AnalysisResult::unavailable`] is returned instead of an error.
    pub async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, LlmError> {
        if self.config.credential().is_none() {
            return Err(LlmError::Configuration(format!(
                "{} API key missing",
                self.provider.name()
            )));
        }
        if transcript.trim().is_empty() {
            return Err(LlmError::InvalidInput(
                "No transcript text provided".to_string(),
            ));
        }

        let text = truncate_transcript(transcript, self.config.max_transcript_chars);
        if text.len() != transcript.len() {
            info!(
                "Transcript truncated to {} characters",
                self.config.max_transcript_chars
            );
        }

        let request = CompletionRequest {
            system: ANALYSIS_SYSTEM_PROMPT.to_string(),
            prompt: build_analysis_prompt(&text),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let models = self.config.candidate_models();
        for (attempt, model) in models.iter().enumerate() {
            debug!(
                "Trying model {} ({}/{})",
                model,
                attempt + 1,
                models.len()
            );
            match self.try_model(model, &request).await {
                Ok(result) => {
                    info!("Analysis completed with model {}", model);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Model {} failed: {}", model, e);
                }
            }
        }

        warn!(
            "All {} models failed via {}, returning placeholder analysis",
            models.len(),
            self.provider.name()
        );
        Ok(AnalysisResult::unavailable())
    }

    async fn try_model(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<AnalysisResult, LlmError> {
        let raw = tokio::time::timeout(self.call_timeout, self.provider.complete(model, request))
            .await
            .map_err(|_| {
                LlmError::Timeout(format!("{} after {:?}", model, self.call_timeout))
            })??;

        parse_analysis(&raw)
    }
}
