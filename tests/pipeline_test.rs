//! End-to-end question cycles against a scripted language model.

use async_trait::async_trait;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use talk_to_data::error::ErrorKind;
use talk_to_data::observability::QueryLogger;
use talk_to_data::{
    DataAssistant, DataTalkError, GenerationOptions, LanguageModel, Result, SchemaStore, Stage,
    TabularDataset, Value, Visualization,
};
use tempfile::TempDir;

/// Returns the same reply for every prompt and remembers what it was asked.
struct ScriptedModel {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(DataTalkError::LlmCall)
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn shop_store() -> SchemaStore {
    let mut store = SchemaStore::new();
    store.replace_dataset(
        "customers",
        TabularDataset::new(
            vec!["customer_id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), text("Alice")],
                vec![Value::Integer(2), text("Bob")],
                vec![Value::Integer(3), text("Chen")],
            ],
        )
        .unwrap(),
    );
    store.replace_dataset(
        "orders",
        TabularDataset::new(
            vec!["order_id".into(), "customer_id".into(), "month".into(), "amount".into()],
            vec![
                vec![Value::Integer(10), Value::Integer(1), text("2024-01"), Value::Real(120.5)],
                vec![Value::Integer(11), Value::Integer(2), text("2024-01"), Value::Real(60.0)],
                vec![Value::Integer(12), Value::Integer(1), text("2024-02"), Value::Real(80.0)],
            ],
        )
        .unwrap(),
    );
    store.set_schema(
        "CREATE TABLE customers (customer_id INT, name TEXT);\n\
         CREATE TABLE orders (order_id INT, customer_id INT, month TEXT, amount REAL);",
    );
    store
}

fn assistant(model: Arc<ScriptedModel>, store: SchemaStore) -> DataAssistant {
    DataAssistant::new(model, store, GenerationOptions::default())
}

#[tokio::test]
async fn test_count_question_returns_single_cell() {
    let model = ScriptedModel::replying("```sql\nSELECT COUNT(*) AS n FROM customers;\n```");
    let assistant = assistant(model.clone(), shop_store());

    let answer = assistant.ask("How many customers are there?").await.unwrap();
    assert_eq!(answer.sql, "SELECT COUNT(*) AS n FROM customers;");
    assert_eq!(answer.result.columns(), &["n"]);
    assert_eq!(answer.result.rows(), &[vec![Value::Integer(3)]]);
    assert!(matches!(answer.visualization, Visualization::NotRequested));
    assert!(answer.skipped_tables.is_empty());

    let prompt = model.last_prompt();
    assert!(prompt.contains("Only use these tables: customers, orders."));
    assert!(prompt.contains("CREATE TABLE orders"));
    assert!(prompt.ends_with("Question: How many customers are there?"));
}

#[tokio::test]
async fn test_destructive_sql_never_reaches_the_store() {
    let model = ScriptedModel::replying("DROP TABLE customers;");
    let assistant = assistant(model, shop_store());

    let failure = assistant.ask("Delete the customers table").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Translate);
    assert!(failure.sql.is_none());
    assert_eq!(failure.error.kind(), ErrorKind::UnsafeQuery);
    assert_eq!(failure.to_string(), "Unsafe query detected, blocked for safety.");

    // the table is untouched for the next cycle
    let model = ScriptedModel::replying("SELECT COUNT(*) FROM customers");
    let assistant = DataAssistant::new(model, assistant.store().clone(), GenerationOptions::default());
    let answer = assistant.ask("How many customers?").await.unwrap();
    assert_eq!(answer.result.rows()[0][0], Value::Integer(3));
}

#[tokio::test]
async fn test_plot_question_renders_bar_chart() {
    let model = ScriptedModel::replying(
        "SELECT month, COUNT(*) AS orders FROM orders GROUP BY month ORDER BY month",
    );
    let assistant = assistant(model, shop_store());

    let answer = assistant.ask("Plot orders by month").await.unwrap();
    let chart = answer.visualization.chart().expect("chart");
    assert_eq!(chart.category_field, "month");
    assert_eq!(chart.value_field, "orders");
    assert_eq!(chart.bars.len(), 2);
    assert_eq!(chart.bars[0].category, "2024-01");
    assert_eq!(chart.bars[0].value, 2.0);
}

#[tokio::test]
async fn test_chart_request_on_text_result_is_unavailable() {
    let model = ScriptedModel::replying("SELECT name FROM customers ORDER BY name");
    let assistant = assistant(model, shop_store());

    let answer = assistant.ask("Show a chart of customer names").await.unwrap();
    assert_eq!(answer.result.row_count(), 3);
    match answer.visualization {
        Visualization::Unavailable(note) => assert!(note.contains("numeric")),
        other => panic!("expected no chart, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execution_error_keeps_generated_sql() {
    let model = ScriptedModel::replying("SELECT * FROM invoices");
    let assistant = assistant(model, shop_store());

    let failure = assistant.ask("List invoices").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Execute);
    assert_eq!(failure.sql.as_deref(), Some("SELECT * FROM invoices"));
    assert_eq!(failure.error.kind(), ErrorKind::Execution);
    assert!(failure.to_string().starts_with("SQL Execution Error:"));
}

#[tokio::test]
async fn test_model_failure_is_reported_as_generation_error() {
    let model = ScriptedModel::failing("rate limited");
    let assistant = assistant(model, shop_store());

    let failure = assistant.ask("How many orders?").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Translate);
    assert_eq!(failure.error.kind(), ErrorKind::LlmCall);
    assert_eq!(failure.to_string(), "Error generating SQL: rate limited");
}

#[tokio::test]
async fn test_fence_only_reply_is_empty_response() {
    let model = ScriptedModel::replying("```sql\n```");
    let assistant = assistant(model, shop_store());

    let failure = assistant.ask("How many orders?").await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::EmptyResponse);
}

#[tokio::test]
async fn test_questions_are_gated_until_schema_and_tables_exist() {
    let model = ScriptedModel::replying("SELECT 1");

    let mut store = SchemaStore::new();
    store.replace_dataset(
        "t",
        TabularDataset::new(vec!["x".into()], vec![vec![Value::Integer(1)]]).unwrap(),
    );
    let mut assistant = assistant(model.clone(), store);

    let failure = assistant.ask("anything").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Input);
    assert_eq!(failure.error.kind(), ErrorKind::Config);

    let failure = assistant.ask("   ").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Input);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);

    assistant.store_mut().set_schema("CREATE TABLE t (x INT);");
    let answer = assistant.ask("anything").await.unwrap();
    assert_eq!(answer.result.rows(), &[vec![Value::Integer(1)]]);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_table_is_queryable() {
    let model = ScriptedModel::replying("SELECT * FROM b");
    let mut store = SchemaStore::new();
    store.replace_dataset(
        "a",
        TabularDataset::new(
            vec!["id".into()],
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]],
        )
        .unwrap(),
    );
    store.replace_dataset("b", TabularDataset::empty(vec!["id".into(), "label".into()]));
    store.set_schema("CREATE TABLE a (id INT); CREATE TABLE b (id INT, label TEXT);");
    let assistant = assistant(model, store);

    let answer = assistant.ask("What is in b?").await.unwrap();
    assert_eq!(answer.result.columns(), &["id", "label"]);
    assert!(answer.result.is_empty());
}

#[tokio::test]
async fn test_replaced_dataset_is_seen_by_next_cycle() {
    let model = ScriptedModel::replying("SELECT COUNT(*) FROM customers");
    let mut assistant = assistant(model, shop_store());
    assert_eq!(
        assistant.ask("count").await.unwrap().result.rows()[0][0],
        Value::Integer(3)
    );

    assistant.store_mut().replace_dataset(
        "customers",
        TabularDataset::new(
            vec!["customer_id".into(), "name".into()],
            vec![vec![Value::Integer(9), text("Zoe")]],
        )
        .unwrap(),
    );
    assert_eq!(
        assistant.ask("count").await.unwrap().result.rows()[0][0],
        Value::Integer(1)
    );
}

#[tokio::test]
async fn test_every_cycle_is_logged() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("queries.jsonl");
    let model = ScriptedModel::replying("SELECT name FROM customers");
    let assistant = assistant(model, shop_store())
        .with_logger(QueryLogger::new(Some(log_path.clone()), 10));

    assistant.ask("names").await.unwrap();
    assistant.ask("").await.unwrap_err();

    let recent = assistant.logger().recent(10);
    assert_eq!(recent.len(), 2);
    assert!(!recent[0].success);
    assert_eq!(recent[0].error_kind, Some(ErrorKind::Config));
    assert!(recent[1].success);
    assert_eq!(recent[1].rows_returned, Some(3));
    assert_eq!(recent[1].sql_generated.as_deref(), Some("SELECT name FROM customers"));

    let lines = fs::read_to_string(&log_path).unwrap();
    assert_eq!(lines.lines().count(), 2);
}

#[tokio::test]
async fn test_store_loaded_from_directories() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let schema = dir.path().join("schema");
    fs::create_dir_all(&data).unwrap();
    fs::create_dir_all(&schema).unwrap();
    fs::write(data.join("flights.csv"), "carrier,delay\nAA,12\nUA,3\nAA,7\n").unwrap();
    fs::write(schema.join("flights.ddl"), "CREATE TABLE flights (carrier TEXT, delay INT);").unwrap();

    let store = SchemaStore::load(&data, &schema).unwrap();
    let model = ScriptedModel::replying(
        "```\nSELECT carrier, SUM(delay) AS total FROM flights GROUP BY carrier ORDER BY carrier\n```",
    );
    let assistant = assistant(model, store);

    let answer = assistant.ask("bar chart of total delay per carrier").await.unwrap();
    assert_eq!(
        answer.result.rows(),
        &[
            vec![text("AA"), Value::Integer(19)],
            vec![text("UA"), Value::Integer(3)],
        ]
    );
    assert_eq!(answer.visualization.chart().unwrap().bars.len(), 2);
}

fn with_bad_table(mut store: SchemaStore) -> SchemaStore {
    // duplicate column names cannot be created as a relation
    store.replace_dataset(
        "broken",
        TabularDataset::new(
            vec!["id".into(), "id".into()],
            vec![vec![Value::Integer(1), Value::Integer(2)]],
        )
        .unwrap(),
    );
    store
}

#[tokio::test]
async fn test_unloadable_table_is_skipped_and_reported() {
    let model = ScriptedModel::replying("SELECT COUNT(*) FROM orders");
    let assistant = assistant(model.clone(), with_bad_table(shop_store()));

    let answer = assistant.ask("How many orders?").await.unwrap();
    assert_eq!(answer.result.rows()[0][0], Value::Integer(3));
    assert_eq!(answer.skipped_tables, vec!["broken"]);
    assert!(model
        .last_prompt()
        .contains("Only use these tables: customers, orders."));
}

#[tokio::test]
async fn test_no_loadable_tables_stops_before_the_model() {
    let model = ScriptedModel::replying("SELECT 1");
    let mut store = with_bad_table(SchemaStore::new());
    store.set_schema("CREATE TABLE broken (id INT);");
    let assistant = assistant(model.clone(), store);

    let failure = assistant.ask("anything").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Materialize);
    assert_eq!(failure.error.kind(), ErrorKind::Materialization);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_comment_only_reply_is_empty_query() {
    let model = ScriptedModel::replying("-- no query possible");
    let assistant = assistant(model, shop_store());

    let failure = assistant.ask("What is the meaning of life?").await.unwrap_err();
    assert_eq!(failure.stage, Stage::Execute);
    assert_eq!(failure.error.kind(), ErrorKind::EmptyQuery);
    assert_eq!(failure.sql.as_deref(), Some("-- no query possible"));
    assert_eq!(
        failure.to_string(),
        "SQL Execution Error: Cleaned SQL query is empty."
    );
}

#[tokio::test]
async fn test_plot_with_no_rows_draws_empty_chart() {
    let model = ScriptedModel::replying(
        "SELECT month, COUNT(*) AS orders FROM orders WHERE month = '1999-01' GROUP BY month",
    );
    let assistant = assistant(model, shop_store());

    let answer = assistant.ask("Plot orders by month").await.unwrap();
    assert!(answer.result.is_empty());
    let chart = answer.visualization.chart().expect("chart");
    assert!(chart.bars.is_empty());
    assert_eq!(chart.category_field, "month");
}
