use talk_to_data::config::{LlmConfig, SessionConfig};
use talk_to_data::observability::QueryLogger;
use talk_to_data::{Answer, DataAssistant, GenerationOptions, LlmClient, SchemaStore, Visualization};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "talk-to-data")]
#[command(about = "Ask natural-language questions about CSV tables described by a DDL schema")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SessionArgs {
    /// Directory holding one CSV file per table
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding the DDL file
    #[arg(long, global = true, default_value = "schema")]
    schema_dir: PathBuf,

    /// API key (or set LLM_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (or set LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Chat completions base URL (or set LLM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Sampling temperature, clamped to 0.0-1.0
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Output token cap, clamped to 10-2000
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Append one JSON line per question to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Result rows to print
    #[arg(long, global = true, default_value_t = 5)]
    preview_rows: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        question: String,

        /// Write the full result to this CSV file
        #[arg(long)]
        csv_out: Option<PathBuf>,

        /// Write the chart (Vega-Lite JSON) to this file
        #[arg(long)]
        chart_out: Option<PathBuf>,
    },
    /// Interactive question loop
    Chat,
    /// List loaded tables and schema status
    Tables,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let session = SessionConfig {
        data_dir: args.session.data_dir.clone(),
        schema_dir: args.session.schema_dir.clone(),
        log_file: args.session.log_file.clone(),
    };
    let store = SchemaStore::load(&session.data_dir, &session.schema_dir)
        .context("Failed to load tables")?;

    match args.command {
        Commands::Tables => {
            print_tables(&store);
            Ok(())
        }
        Commands::Ask { question, csv_out, chart_out } => {
            let assistant = build_assistant(&args.session, &session, store);
            let ok = answer_once(
                &assistant,
                &question,
                args.session.preview_rows,
                csv_out.as_deref(),
                chart_out.as_deref(),
            )
            .await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Chat => {
            let assistant = build_assistant(&args.session, &session, store);
            chat_loop(&assistant, args.session.preview_rows).await
        }
    }
}

fn build_assistant(args: &SessionArgs, session: &SessionConfig, store: SchemaStore) -> DataAssistant {
    let llm_config = LlmConfig::from_env()
        .with_api_key(args.api_key.clone())
        .with_model(args.model.clone())
        .with_base_url(args.base_url.clone())
        .with_temperature(args.temperature)
        .with_max_output_tokens(args.max_tokens);
    info!(
        "Using model {} (temperature {}, max tokens {})",
        llm_config.model, llm_config.temperature, llm_config.max_output_tokens
    );

    let client = LlmClient::from_config(&llm_config);
    DataAssistant::new(Arc::new(client), store, GenerationOptions::from(&llm_config))
        .with_logger(QueryLogger::new(session.log_file.clone(), 1000))
}

fn print_tables(store: &SchemaStore) {
    println!("\n=== Tables ===");
    if store.datasets().is_empty() {
        println!("  (none)");
    }
    for (name, dataset) in store.datasets() {
        println!(
            "  - {} ({} rows, {} columns: {})",
            name,
            dataset.row_count(),
            dataset.column_count(),
            dataset.columns().join(", ")
        );
    }
    for (path, reason) in store.skipped_files() {
        println!("  ! skipped {}: {}", path.display(), reason);
    }

    match store.schema() {
        Some(schema) => println!(
            "\nSchema: {}",
            schema
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(inline)".to_string())
        ),
        None => println!("\nSchema: missing"),
    }
    if let Some(problem) = store.readiness_problem() {
        println!("\nQuestions are disabled: {}", problem);
    }
}

/// Returns false when the question failed.
async fn answer_once(
    assistant: &DataAssistant,
    question: &str,
    preview_rows: usize,
    csv_out: Option<&Path>,
    chart_out: Option<&Path>,
) -> Result<bool> {
    match assistant.ask(question).await {
        Ok(answer) => {
            print_answer(&answer, preview_rows);
            if let Some(path) = csv_out {
                answer
                    .result
                    .write_csv(path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Result written to {}", path.display());
            }
            if let (Some(path), Some(chart)) = (chart_out, answer.visualization.chart()) {
                let spec = serde_json::to_string_pretty(&chart.to_vega_lite())?;
                std::fs::write(path, spec)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Chart written to {}", path.display());
            }
            Ok(true)
        }
        Err(failure) => {
            if let Some(ref sql) = failure.sql {
                println!("\n{}\n", sql);
            }
            eprintln!("{}", failure);
            Ok(false)
        }
    }
}

fn print_answer(answer: &Answer, preview_rows: usize) {
    println!("\n{}\n", answer.sql);
    if !answer.skipped_tables.is_empty() {
        println!("(tables not loaded: {})\n", answer.skipped_tables.join(", "));
    }
    print!("{}", answer.result.head(preview_rows));
    if answer.result.row_count() > preview_rows {
        println!("... {} rows total", answer.result.row_count());
    }

    match &answer.visualization {
        Visualization::NotRequested => {}
        Visualization::Chart(chart) => println!(
            "\nVisualization: bar chart of {} by {} ({} bars)",
            chart.value_field,
            chart.category_field,
            chart.bars.len()
        ),
        Visualization::Unavailable(note) => println!("\nVisualization: {}", note),
    }
}

async fn chat_loop(assistant: &DataAssistant, preview_rows: usize) -> Result<()> {
    if let Some(problem) = assistant.store().readiness_problem() {
        println!("Chat is disabled: {}", problem);
        println!("Add a DDL file to the schema directory and CSV tables to the data directory.");
        return Ok(());
    }

    println!(
        "Loaded {} tables. Ask a question about your data ('exit' to quit).",
        assistant.store().datasets().len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        answer_once(assistant, question, preview_rows, None, None).await?;
    }
    Ok(())
}
