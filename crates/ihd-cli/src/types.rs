use std::collections::BTreeMap;
use std::path::PathBuf;

use ihd_core::{CohortStatistics, Evaluation, OverlapMatrix, TemporalWindow};
use ihd_report::OutputFiles;

/// Options for one cohort selection run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Folder holding lookup reference lists.
    pub reference_dir: PathBuf,
    pub parallel: bool,
    pub dry_run: bool,
}

impl RunOptions {
    /// Defaults for a data folder: outputs in `<data_dir>/output`,
    /// reference lists next to the data, parallel evaluation.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            output_dir: data_dir.join("output"),
            reference_dir: data_dir.clone(),
            data_dir,
            parallel: true,
            dry_run: false,
        }
    }
}

/// A criterion that produced no evaluation.
#[derive(Debug, Clone)]
pub struct CriterionFailure {
    pub label: String,
    pub source: String,
    pub message: String,
}

#[derive(Debug)]
pub struct RunResult {
    pub criteria_version: String,
    pub window: TemporalWindow,
    pub output_dir: PathBuf,
    pub patient_index_rows: usize,
    pub patient_index_skipped_rows: usize,
    pub evaluations: Vec<Evaluation>,
    pub failures: Vec<CriterionFailure>,
    pub statistics: Vec<CohortStatistics>,
    pub overlap: OverlapMatrix,
    pub membership_rows: usize,
    /// Warnings across all evaluations.
    pub warnings: usize,
    /// Source name to the expected file name.
    pub missing_sources: BTreeMap<String, String>,
    /// Non-fatal problems outside individual criteria.
    pub errors: Vec<String>,
    pub outputs: Option<OutputFiles>,
    pub manifest: Option<PathBuf>,
    /// No criterion produced an evaluation.
    pub has_errors: bool,
}
