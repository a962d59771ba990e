//! Prompt for natural-language → SQL translation.

/// Build the translation prompt. Output depends only on the inputs; table
/// names are listed in the order given (callers pass them sorted).
pub fn compose<S: AsRef<str>>(
    question: &str,
    table_names: &[S],
    schema_description: Option<&str>,
) -> String {
    let available_tables = table_names
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(", ");

    let schema_section = match schema_description.filter(|s| !s.trim().is_empty()) {
        Some(ddl) => format!("\nHere is the SQL schema for your database:\n{}\n", ddl),
        None => String::new(),
    };

    format!(
        r#"Convert this question into a valid SQLite SQL query.
Only use these tables: {}.
{}
Avoid destructive queries: never modify, delete or create data or tables.
Make sure to complete the full query always; never return a truncated statement.
Return only the SQL query, without explanation.
Question: {}"#,
        available_tables, schema_section, question
    )
}
