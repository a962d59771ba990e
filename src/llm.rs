use crate::config::LlmConfig;
use crate::error::{DataTalkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampling settings for one completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: crate::config::DEFAULT_TEMPERATURE,
            max_output_tokens: crate::config::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl From<&LlmConfig> for GenerationOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Text-generation backend. Output is untrusted text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Single completion. Transport and provider failures are `LlmCall`;
    /// a response without content is returned as an empty string.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct LlmClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You translate questions into SQLite queries."},
                {"role": "user", "content": prompt}
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_output_tokens
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            DataTalkError::LlmCall(
                "API key not configured (set LLM_API_KEY or OPENAI_API_KEY)".to_string(),
            )
        })?;

        debug!(model = %self.model, "Calling chat completions");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, options))
            .send()
            .await
            .map_err(|e| DataTalkError::LlmCall(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(200).collect();
            return Err(DataTalkError::LlmCall(format!(
                "LLM HTTP {}: {}",
                status, truncated
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DataTalkError::LlmCall(format!("Failed to parse LLM response: {}", e)))?;

        completion_text(&response_json)
    }
}

/// Pull the first choice's message content out of a chat completions body.
fn completion_text(body: &serde_json::Value) -> Result<String> {
    if let Some(err) = body.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown provider error");
        return Err(DataTalkError::LlmCall(message.to_string()));
    }

    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| DataTalkError::LlmCall("No choices in LLM response".to_string()))?;

    Ok(choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}
