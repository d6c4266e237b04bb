//! Run manifest.
//!
//! A JSON record of what a run used and produced, written next to the CSV
//! outputs so a cohort can be traced back to its criteria version and
//! input files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ihd_core::{CohortStatistics, Evaluation, EvaluatorFailure, ScanStats, TemporalWindow};
use ihd_criteria::{CriteriaSet, CriteriaWarning};
use serde::Serialize;

use crate::error::{ReportError, Result};

pub const RUN_MANIFEST_SCHEMA: &str = "ihd-cohort.run";
pub const RUN_MANIFEST_SCHEMA_VERSION: u32 = 1;
pub const RUN_MANIFEST_FILE: &str = "run_manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaInfo {
    pub version: String,
    pub fingerprint: String,
    pub window: TemporalWindow,
}

impl CriteriaInfo {
    pub fn from_criteria(criteria: &CriteriaSet) -> Self {
        Self {
            version: criteria.version.clone(),
            fingerprint: criteria.fingerprint.clone(),
            window: criteria.window.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputRecord {
    pub source: String,
    pub path: Option<PathBuf>,
    pub rows: Option<usize>,
    /// sha256 of the file contents.
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub label: String,
    pub kind: &'static str,
    pub source: String,
    pub stats: ScanStats,
    pub warnings: Vec<CriteriaWarning>,
}

impl From<&Evaluation> for EvaluationRecord {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            label: evaluation.label.to_string(),
            kind: evaluation.kind.as_str(),
            source: evaluation.source.clone(),
            stats: evaluation.stats,
            warnings: evaluation.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub label: String,
    pub source: String,
    pub error: String,
}

impl From<&EvaluatorFailure> for FailureRecord {
    fn from(failure: &EvaluatorFailure) -> Self {
        Self {
            label: failure.label.clone(),
            source: failure.source.clone(),
            error: failure.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema: &'static str,
    pub schema_version: u32,
    pub generated_at: String,
    pub criteria: CriteriaInfo,
    pub inputs: Vec<InputRecord>,
    pub patient_index_rows: usize,
    pub patient_index_skipped_rows: usize,
    pub evaluations: Vec<EvaluationRecord>,
    pub failures: Vec<FailureRecord>,
    pub cohorts: Vec<CohortStatistics>,
    /// Keys in at least one cohort.
    pub union: usize,
    pub notes: Vec<String>,
    pub outputs: BTreeMap<String, PathBuf>,
}

impl RunManifest {
    pub fn new(criteria: &CriteriaSet) -> Self {
        Self {
            schema: RUN_MANIFEST_SCHEMA,
            schema_version: RUN_MANIFEST_SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            criteria: CriteriaInfo::from_criteria(criteria),
            inputs: Vec::new(),
            patient_index_rows: 0,
            patient_index_skipped_rows: 0,
            evaluations: Vec::new(),
            failures: Vec::new(),
            cohorts: Vec::new(),
            union: 0,
            notes: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Record an input file with its checksum.
    pub fn add_input(&mut self, source: &str, path: Option<&Path>, rows: Option<usize>) {
        let sha256 = path
            .and_then(|p| std::fs::read(p).ok())
            .map(|bytes| ihd_criteria::hash::sha256_hex(&bytes));
        self.inputs.push(InputRecord {
            source: source.to_string(),
            path: path.map(Path::to_path_buf),
            rows,
            sha256,
        });
    }

    pub fn warning_count(&self) -> usize {
        self.evaluations.iter().map(|e| e.warnings.len()).sum()
    }
}

/// Write the manifest as pretty JSON to `dir/run_manifest.json`.
pub fn write_run_manifest(dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| ReportError::Create {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = dir.join(RUN_MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&path, format!("{json}\n")).map_err(|e| ReportError::Write {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(path)
}
