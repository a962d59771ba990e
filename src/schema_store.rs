//! Schema Store
//!
//! Holds the session's datasets and its (optional) DDL text. Datasets are
//! loaded from `<data_dir>/*.csv`, one table per file named after the file
//! stem; the DDL comes from the first file in the schema directory.

use crate::dataset::TabularDataset;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// DDL text, passed to prompts verbatim and never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescription {
    pub source: Option<PathBuf>,
    pub text: String,
}

#[derive(Debug, Default, Clone)]
pub struct SchemaStore {
    datasets: BTreeMap<String, TabularDataset>,
    schema: Option<SchemaDescription>,
    skipped_files: Vec<(PathBuf, String)>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load CSV datasets and the DDL file. Missing directories give an empty
    /// store; unreadable CSV files are skipped and listed in `skipped_files`.
    pub fn load(data_dir: impl AsRef<Path>, schema_dir: impl AsRef<Path>) -> Result<Self> {
        let mut store = Self::new();
        store.load_datasets(data_dir.as_ref())?;
        store.schema = read_schema(schema_dir.as_ref())?;
        info!(
            "Loaded {} tables (schema: {})",
            store.datasets.len(),
            if store.schema.is_some() { "present" } else { "missing" }
        );
        Ok(store)
    }

    fn load_datasets(&mut self, data_dir: &Path) -> Result<()> {
        if !data_dir.is_dir() {
            warn!("Data directory {} not found", data_dir.display());
            return Ok(());
        }

        for path in sorted_files(data_dir)? {
            if !has_extension(&path, "csv") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match TabularDataset::read_csv(&path) {
                Ok(dataset) => {
                    self.datasets.insert(name, dataset);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    self.skipped_files.push((path, e.to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn datasets(&self) -> &BTreeMap<String, TabularDataset> {
        &self.datasets
    }

    pub fn dataset(&self, name: &str) -> Option<&TabularDataset> {
        self.datasets.get(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn schema(&self) -> Option<&SchemaDescription> {
        self.schema.as_ref()
    }

    pub fn schema_text(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.text.as_str())
    }

    pub fn skipped_files(&self) -> &[(PathBuf, String)] {
        &self.skipped_files
    }

    /// Insert or wholesale-replace a dataset.
    pub fn replace_dataset(&mut self, name: impl Into<String>, dataset: TabularDataset) {
        self.datasets.insert(name.into(), dataset);
    }

    pub fn set_schema(&mut self, text: impl Into<String>) {
        self.schema = Some(SchemaDescription {
            source: None,
            text: text.into(),
        });
    }

    /// Questions are only accepted once both a schema and at least one table exist.
    pub fn is_ready(&self) -> bool {
        self.schema.is_some() && !self.datasets.is_empty()
    }

    /// What is missing before questions can be asked, if anything.
    pub fn readiness_problem(&self) -> Option<String> {
        match (self.schema.is_some(), !self.datasets.is_empty()) {
            (true, true) => None,
            (false, true) => Some("no DDL file found in the schema directory".to_string()),
            (true, false) => Some("no CSV tables found in the data directory".to_string()),
            (false, false) => Some(
                "no DDL file in the schema directory and no CSV tables in the data directory"
                    .to_string(),
            ),
        }
    }
}

/// Prefer `.ddl` files; otherwise take the first regular file.
fn read_schema(schema_dir: &Path) -> Result<Option<SchemaDescription>> {
    if !schema_dir.is_dir() {
        return Ok(None);
    }

    let files = sorted_files(schema_dir)?;
    let ddl_files: Vec<&PathBuf> = files.iter().filter(|p| has_extension(p, "ddl")).collect();
    let candidates: Vec<&PathBuf> = if ddl_files.is_empty() {
        files.iter().collect()
    } else {
        ddl_files
    };

    let Some(path) = candidates.first() else {
        return Ok(None);
    };
    if candidates.len() > 1 {
        warn!(
            "{} schema files found in {}; using {}. Mixing schemas can confuse the model",
            candidates.len(),
            schema_dir.display(),
            path.display()
        );
    }

    let text = std::fs::read_to_string(path)?;
    Ok(Some(SchemaDescription {
        source: Some((*path).clone()),
        text,
    }))
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
