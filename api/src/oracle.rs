//! The LLM boundary. Four stateless calls (analyst, facilitator, final
//! summary, evaluation) all go through one completion endpoint; the trait
//! exists so tests can script responses without a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A single stateless completion request. The full relevant context is
/// passed every time; nothing is remembered between calls.
#[async_trait]
pub trait ReflectionOracle: Send + Sync {
    async fn complete(&self, system_prompt: &str, payload: String) -> Result<String, AppError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// reqwest-backed client for an OpenAI-compatible chat completions API.
pub struct CompletionClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn from_env() -> Result<Self, AppError> {
        let api_url = std::env::var("ORACLE_API_URL")
            .unwrap_or_else(|_| "https://api.cerebras.ai/v1".to_string());
        let api_key = std::env::var("ORACLE_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Internal("ORACLE_API_KEY must be configured".to_string()))?;
        let model =
            std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "llama-3.3-70b".to_string());

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ReflectionOracle for CompletionClient {
    async fn complete(&self, system_prompt: &str, payload: String) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatRequestMessage {
                    role: "user",
                    content: &payload,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        tracing::debug!(chars = content.len(), "oracle completion received");
        Ok(content)
    }
}
