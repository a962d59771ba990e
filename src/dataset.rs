//! Tabular datasets
//!
//! A `TabularDataset` is an ordered set of named columns plus rows of
//! primitive values. Datasets are replaced wholesale, never edited in place.

use crate::error::{DataTalkError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Coerce a raw CSV cell: empty → NULL, true/false → boolean, then integer, float, text.
    pub fn coerce(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Boolean(false);
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Value::Real(f);
            }
        }

        Value::Text(trimmed.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Storage type inferred for a column when it is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularDataset {
    /// Build a dataset, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataTalkError::Dataset(format!(
                    "row {} has {} values but {} columns are declared",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> TabularDataset {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// Storage type for column `idx`: any text wins, then any real, otherwise integer.
    /// A column with no non-null values is stored as text.
    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut seen_number = false;
        let mut seen_real = false;
        for value in self.column_values(idx) {
            match value {
                Value::Null => {}
                Value::Text(_) => return ColumnType::Text,
                Value::Real(_) => {
                    seen_number = true;
                    seen_real = true;
                }
                Value::Integer(_) | Value::Boolean(_) => seen_number = true,
            }
        }
        match (seen_number, seen_real) {
            (false, _) => ColumnType::Text,
            (true, true) => ColumnType::Real,
            (true, false) => ColumnType::Integer,
        }
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let columns = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(Value::coerce).collect());
        }

        Self::new(columns, rows)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_path(path.as_ref())?;
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for TabularDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_row(f, &self.columns, &widths)?;
        write!(f, "|")?;
        for width in &widths {
            write!(f, "{}|", "-".repeat(width + 2))?;
        }
        writeln!(f)?;
        for row in &cells {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, values: &[String], widths: &[usize]) -> fmt::Result {
    write!(f, "|")?;
    for (value, width) in values.iter().zip(widths) {
        write!(f, " {:<width$} |", value, width = *width)?;
    }
    writeln!(f)
}
