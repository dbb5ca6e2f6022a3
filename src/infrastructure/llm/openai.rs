use crate::config::LlmConfig;
use crate::domain::ports::llm_client::LlmClient;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| format!("HTTP client error: {e}"))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let resp = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage { role: "system", content: system },
                    ChatMessage { role: "user", content: user },
                ],
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(|e| format!("LLM API error: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("LLM API {status}: {body}"));
        }

        let result: ChatResponse = resp.json().await.map_err(|e| format!("Parse error: {e}"))?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "LLM reply had no content".to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
