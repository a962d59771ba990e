//! Natural language → SQL translation.
//!
//! Model output is untrusted: it is cleaned, checked against the keyword
//! blocklist, and only then handed back as a statement. Every failure comes
//! back as a typed error; rejected SQL is logged but never returned.

use crate::error::{DataTalkError, Result};
use crate::llm::{GenerationOptions, LanguageModel};
use crate::safety_guardrails;
use crate::sql_prompts;
use crate::sql_sanitizer;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SqlTranslator {
    model: Arc<dyn LanguageModel>,
    options: GenerationOptions,
}

impl SqlTranslator {
    pub fn new(model: Arc<dyn LanguageModel>, options: GenerationOptions) -> Self {
        Self { model, options }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Translate `question` into a vetted SQL statement over `table_names`.
    pub async fn translate<S: AsRef<str>>(
        &self,
        question: &str,
        table_names: &[S],
        schema_description: Option<&str>,
    ) -> Result<String> {
        let prompt = sql_prompts::compose(question, table_names, schema_description);
        debug!(prompt = %prompt, "Composed translation prompt");

        let raw = self
            .model
            .generate(&prompt, &self.options)
            .await
            .map_err(|e| match e {
                DataTalkError::LlmCall(_) => e,
                other => DataTalkError::LlmCall(other.to_string()),
            })?;
        debug!(model = self.model.name(), raw = %raw, "Model output");

        if raw.trim().is_empty() {
            return Err(DataTalkError::EmptyResponse);
        }

        let sql = sql_sanitizer::clean(&raw);
        if sql.is_empty() {
            return Err(DataTalkError::EmptyResponse);
        }

        if let Some(keyword) = safety_guardrails::forbidden_keyword(&sql) {
            warn!(keyword = %keyword, sql = %sql, "Blocked unsafe SQL from model");
            return Err(DataTalkError::UnsafeQuery);
        }

        info!("Generated SQL: {}", sql);
        Ok(sql)
    }
}
