//! OpenRouter chat-completions provider.
//!
//! OpenRouter speaks the OpenAI chat format and routes each request to the
//! named upstream model. Attribution headers identify the calling app.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionProvider, CompletionRequest, LlmConfig, LlmError};

pub struct OpenRouterProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    app_url: String,
    app_title: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

impl OpenRouterProvider {
    pub fn new(client: Client, config: &LlmConfig, api_key: &str) -> Self {
        Self {
            client,
            endpoint: config.endpoint().to_string(),
            api_key: api_key.to_string(),
            app_url: config.app_url.clone(),
            app_title: config.app_title.clone(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("POST {} model={}", url, model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.app_url)
            .header("X-Title", &self.app_title)
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

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Api(error.message));
        }

        parsed
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::Parse("empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn provider(endpoint: &str) -> OpenRouterProvider {
        let mut config = LlmConfig::base_default();
        config.endpoint = endpoint.to_string();
        OpenRouterProvider::new(Client::new(), &config, "sk-test")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "sys".to_string(),
            prompt: "analyze this".to_string(),
            temperature: 0.1,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn test_request_headers_and_body() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                let echo = format!(
                    "{}|{}|{}|{}|{}|{}",
                    header("authorization"),
                    header("http-referer"),
                    header("x-title"),
                    body["model"].as_str().unwrap_or_default(),
                    body["messages"][0]["role"].as_str().unwrap_or_default(),
                    body["messages"][1]["content"].as_str().unwrap_or_default(),
                );
                Json(json!({ "choices": [{ "message": { "content": echo } }] }))
            }),
        );
        let endpoint = spawn_upstream(router).await;

        let reply = provider(&endpoint)
            .complete("vendor/model:free", &request())
            .await
            .unwrap();

        assert_eq!(
            reply,
            "Bearer sk-test|http://localhost:3000|Research Portal|vendor/model:free|system|analyze this"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_and_http_errors() {
        let router = Router::new()
            .route(
                "/limited/chat/completions",
                post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/broken/chat/completions",
                post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
            )
            .route(
                "/empty/chat/completions",
                post(|| async { Json(json!({ "choices": [] })) }),
            );
        let base = spawn_upstream(router).await;

        let err = provider(&format!("{}/limited", base))
            .complete("m", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));

        let err = provider(&format!("{}/broken", base))
            .complete("m", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api(ref msg) if msg.contains("upstream down")));

        let err = provider(&format!("{}/empty", base))
            .complete("m", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
