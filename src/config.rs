//! Runtime configuration
//!
//! Values come from CLI flags first, then environment variables (a `.env`
//! file is loaded by the binary), then defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;

const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
const MAX_TOKENS_RANGE: (u32, u32) = (10, 2000);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl LlmConfig {
    /// Read `LLM_*` variables, falling back to the `OPENAI_*` names.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: first_env(&["LLM_API_KEY", "OPENAI_API_KEY"]),
            model: first_env(&["LLM_MODEL", "OPENAI_MODEL"]).unwrap_or(defaults.model),
            base_url: first_env(&["LLM_BASE_URL", "OPENAI_BASE_URL"]).unwrap_or(defaults.base_url),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        self
    }

    /// Override the sampling temperature, clamped to `[0.0, 1.0]`.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(t) = temperature.filter(|t| t.is_finite()) {
            self.temperature = t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
        }
        self
    }

    /// Override the output cap, clamped to `[10, 2000]`.
    pub fn with_max_output_tokens(mut self, max_tokens: Option<u32>) -> Self {
        if let Some(m) = max_tokens {
            self.max_output_tokens = m.clamp(MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub data_dir: PathBuf,
    pub schema_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            schema_dir: PathBuf::from("schema"),
            log_file: None,
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
