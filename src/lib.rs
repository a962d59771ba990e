pub mod config;
pub mod data_assistant;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod observability;
pub mod query_executor;
pub mod relational_store;
pub mod safety_guardrails;
pub mod schema_store;
pub mod sql_prompts;
pub mod sql_sanitizer;
pub mod translator;
pub mod visualization;

pub use data_assistant::{Answer, DataAssistant, PipelineFailure, Stage, Visualization};
pub use dataset::{TabularDataset, Value};
pub use error::{DataTalkError, ErrorKind, Result};
pub use llm::{GenerationOptions, LanguageModel, LlmClient};
pub use schema_store::SchemaStore;
