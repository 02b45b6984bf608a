use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use aegis_core::config::ModelConfig;
use aegis_core::error::{AegisError, Result};
use aegis_core::traits::LlmClient;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat client. The routing and adjudication reasoning
/// steps are single-shot request/response calls, so no streaming.
pub struct OpenAiCompatClient {
    http: Client,
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: &'static str,
    content: String,
}

// Response types
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient for OpenAiCompatClient {
    fn complete(
        &self,
        config: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();
        let system_prompt = system_prompt.to_string();
        let user_prompt = user_prompt.to_string();

        Box::pin(async move {
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let body = ChatRequest {
                model: config.model_id.clone(),
                messages: vec![
                    OaiMessage {
                        role: "system",
                        content: system_prompt,
                    },
                    OaiMessage {
                        role: "user",
                        content: user_prompt,
                    },
                ],
                max_tokens: config.max_tokens,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
            };

            let api_key = config.resolve_api_key()?;
            let response = self
                .http
                .post(base_url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await
                .map_err(|e| AegisError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(AegisError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| AegisError::LlmParse(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| AegisError::LlmParse("response carried no content".into()))
        })
    }
}
