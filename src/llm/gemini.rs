//! Google Gemini generateContent provider.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionProvider, CompletionRequest, LlmConfig, LlmError};

pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiProvider {
    pub fn new(client: Client, config: &LlmConfig, api_key: &str) -> Self {
        Self {
            client,
            endpoint: config.endpoint().to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let body = GenerateRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: &request.system,
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: 0.8,
                top_k: 40,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.endpoint, model);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited(model.to_string()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Api(error.message));
        }

        parsed
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::Parse("empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "sys".to_string(),
            prompt: "transcript".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
        }
    }

    #[tokio::test]
    async fn test_generate_content_round_trip() {
        let router = Router::new().route(
            "/models/:call",
            post(
                |Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let echo = format!(
                        "{}|{}|{}|{}",
                        call,
                        headers
                            .get("x-goog-api-key")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default(),
                        body["contents"][0]["parts"][0]["text"]
                            .as_str()
                            .unwrap_or_default(),
                        body["generationConfig"]["topK"],
                    );
                    Json(json!({
                        "candidates": [{ "content": { "parts": [{ "text": echo }] } }]
                    }))
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut config = LlmConfig::base_default();
        config.endpoint = format!("http://{}", addr);
        let provider = GeminiProvider::new(Client::new(), &config, "g-key");

        let reply = provider
            .complete("gemini-2.0-flash", &request())
            .await
            .unwrap();
        assert_eq!(reply, "gemini-2.0-flash:generateContent|g-key|transcript|40");
    }

    #[tokio::test]
    async fn test_connection_error_omits_api_key() {
        let mut config = LlmConfig::base_default();
        config.endpoint = "http://127.0.0.1:1".to_string();
        let provider = GeminiProvider::new(Client::new(), &config, "SECRET-KEY-123");

        let err = provider
            .complete("gemini-2.0-flash", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Connection(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }
}
