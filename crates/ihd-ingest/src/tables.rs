//! The set of loaded source tables.

use std::collections::BTreeMap;
use std::path::PathBuf;

use polars::prelude::DataFrame;

use crate::csv::read_csv_table;
use crate::discovery::DiscoveredSources;
use crate::error::{IngestError, Result};

/// Loaded source tables keyed by configured source name.
///
/// Tables are read-only once loaded and shared by all evaluators.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    tables: BTreeMap<String, DataFrame>,
    paths: BTreeMap<String, PathBuf>,
}

impl SourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, df: DataFrame) {
        self.tables.insert(source.into(), df);
    }

    pub fn with_table(mut self, source: impl Into<String>, df: DataFrame) -> Self {
        self.insert(source, df);
        self
    }

    pub fn get(&self, source: &str) -> Option<&DataFrame> {
        self.tables.get(source)
    }

    pub fn require(&self, source: &str) -> Result<&DataFrame> {
        self.get(source).ok_or_else(|| IngestError::SourceUnavailable {
            source_name: source.to_string(),
        })
    }

    /// File a table was loaded from, if it came from disk.
    pub fn path(&self, source: &str) -> Option<&PathBuf> {
        self.paths.get(source)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Row count per source.
    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(name, df)| (name.clone(), df.height()))
            .collect()
    }
}

/// A source file that was found but could not be read.
#[derive(Debug)]
pub struct SourceLoadFailure {
    pub source_name: String,
    pub path: PathBuf,
    pub error: IngestError,
}

/// Load every discovered source.
///
/// Failures are returned alongside the tables that did load; a single
/// unreadable file does not abort the others.
pub fn load_sources(discovered: &DiscoveredSources) -> (SourceTables, Vec<SourceLoadFailure>) {
    let mut tables = SourceTables::new();
    let mut failures = Vec::new();
    for (source, path) in &discovered.found {
        match read_csv_table(path) {
            Ok(df) => {
                tables.tables.insert(source.clone(), df);
                tables.paths.insert(source.clone(), path.clone());
            }
            Err(error) => {
                tracing::warn!(
                    source = %source,
                    path = %path.display(),
                    %error,
                    "failed to load source"
                );
                failures.push(SourceLoadFailure {
                    source_name: source.clone(),
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    (tables, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover_sources;
    use tempfile::TempDir;

    #[test]
    fn unreadable_source_does_not_abort_the_rest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("patients.csv"), "patient_id,index_date\nP1,2020-01-01\n")
            .unwrap();
        std::fs::write(dir.path().join("diagnoses.csv"), "").unwrap();
        let sources = BTreeMap::from([
            ("patients".to_string(), "patients.csv".to_string()),
            ("diagnoses".to_string(), "diagnoses.csv".to_string()),
        ]);
        let discovered = discover_sources(dir.path(), &sources).unwrap();
        let (tables, failures) = load_sources(&discovered);

        assert_eq!(tables.len(), 1);
        assert_eq!(tables.row_counts().get("patients"), Some(&1));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source_name, "diagnoses");
        assert!(matches!(
            tables.require("diagnoses"),
            Err(IngestError::SourceUnavailable { .. })
        ));
    }
}
