//! Data Assistant - answers natural-language questions over the session's tables
//!
//! One call to [`DataAssistant::ask`] is one question cycle:
//! 1. Rebuild an in-memory relational store from the current dataset snapshot
//! 2. Translate the question into vetted SQL
//! 3. Execute it
//! 4. Render a chart when the question asks for one
//!
//! The cycle stops at the first failing stage. The store lives only for the
//! duration of the cycle.

use crate::dataset::TabularDataset;
use crate::error::DataTalkError;
use crate::llm::{GenerationOptions, LanguageModel};
use crate::observability::{QueryLogEntry, QueryLogger};
use crate::query_executor;
use crate::relational_store::RelationalStore;
use crate::schema_store::SchemaStore;
use crate::translator::SqlTranslator;
use crate::visualization::{self, Chart};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Pipeline stage at which a question cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Input,
    Materialize,
    Translate,
    Execute,
}

/// A failed cycle. `sql` is set when SQL was generated before the failure,
/// so callers can show it next to the error.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    pub sql: Option<String>,
    #[source]
    pub error: DataTalkError,
}

impl PipelineFailure {
    fn at(stage: Stage, sql: Option<String>, error: DataTalkError) -> Self {
        Self { stage, sql, error }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Visualization {
    /// The question did not ask for a chart
    NotRequested,
    Chart(Chart),
    /// A chart was asked for but the result cannot be drawn
    Unavailable(String),
}

impl Visualization {
    pub fn chart(&self) -> Option<&Chart> {
        match self {
            Visualization::Chart(chart) => Some(chart),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub sql: String,
    pub result: TabularDataset,
    pub visualization: Visualization,
    /// Tables that could not be loaded into the store this cycle
    pub skipped_tables: Vec<String>,
    pub elapsed_ms: u64,
}

pub struct DataAssistant {
    store: SchemaStore,
    translator: SqlTranslator,
    logger: QueryLogger,
}

impl DataAssistant {
    pub fn new(model: Arc<dyn LanguageModel>, store: SchemaStore, options: GenerationOptions) -> Self {
        Self {
            store,
            translator: SqlTranslator::new(model, options),
            logger: QueryLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Mutable access for wholesale dataset replacement between cycles.
    pub fn store_mut(&mut self) -> &mut SchemaStore {
        &mut self.store
    }

    pub fn logger(&self) -> &QueryLogger {
        &self.logger
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineFailure> {
        let start = Instant::now();
        let outcome = self.run_cycle(question).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let entry = match &outcome {
            Ok(answer) => QueryLogEntry::new(question)
                .with_sql(Some(answer.sql.clone()))
                .with_success(answer.result.row_count(), answer.visualization.chart().is_some()),
            Err(failure) => {
                warn!("Question failed at {:?}: {}", failure.stage, failure.error);
                QueryLogEntry::new(question)
                    .with_sql(failure.sql.clone())
                    .with_error(&failure.error)
            }
        };
        if let Err(e) = self.logger.log(entry.with_elapsed(elapsed_ms)) {
            warn!("Failed to write query log: {}", e);
        }

        outcome.map(|mut answer| {
            answer.elapsed_ms = elapsed_ms;
            answer
        })
    }

    async fn run_cycle(&self, question: &str) -> Result<Answer, PipelineFailure> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineFailure::at(
                Stage::Input,
                None,
                DataTalkError::Config("the question is empty".to_string()),
            ));
        }
        if let Some(problem) = self.store.readiness_problem() {
            return Err(PipelineFailure::at(
                Stage::Input,
                None,
                DataTalkError::Config(format!("cannot answer questions yet: {}", problem)),
            ));
        }

        let (relational, report) = RelationalStore::materialize(self.store.datasets())
            .map_err(|e| PipelineFailure::at(Stage::Materialize, None, e))?;
        if report.loaded.is_empty() {
            let error = report.failures.into_iter().next().unwrap_or_else(|| {
                DataTalkError::Config("no tables could be loaded".to_string())
            });
            return Err(PipelineFailure::at(Stage::Materialize, None, error));
        }
        let table_names: Vec<String> = report.loaded.iter().map(|t| t.name.clone()).collect();

        let sql = self
            .translator
            .translate(question, &table_names, self.store.schema_text())
            .await
            .map_err(|e| PipelineFailure::at(Stage::Translate, None, e))?;

        let result = query_executor::execute(&sql, &relational)
            .map_err(|e| PipelineFailure::at(Stage::Execute, Some(sql.clone()), e))?;
        drop(relational);

        let visualization = if visualization::wants_chart(question) {
            match visualization::try_render(&result) {
                Ok(chart) => Visualization::Chart(chart),
                Err(note) => Visualization::Unavailable(note),
            }
        } else {
            Visualization::NotRequested
        };

        info!(
            "Answered with {} rows (chart: {})",
            result.row_count(),
            visualization.chart().is_some()
        );

        Ok(Answer {
            question: question.to_string(),
            sql,
            result,
            visualization,
            skipped_tables: report.failed_tables(),
            elapsed_ms: 0,
        })
    }
}
