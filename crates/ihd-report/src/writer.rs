//! CSV output files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ihd_core::{CohortStatistics, Evaluation, OverlapMatrix};
use ihd_model::{CohortLabel, CohortTable};
use polars::prelude::*;
use serde::Serialize;

use crate::error::{ReportError, Result};
use crate::frames::{hits_frame, membership_frame, overlap_frame, statistics_frame};

pub const MEMBERSHIP_FILE: &str = "cohort_membership.csv";
pub const SUMMARY_FILE: &str = "cohort_summary.csv";
pub const OVERLAP_FILE: &str = "cohort_overlap.csv";

pub fn hits_file_name(label: &CohortLabel) -> String {
    format!("hits_{label}.csv")
}

/// Write a frame as comma-separated CSV with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|e| ReportError::Create {
        path: path.to_path_buf(),
        source: e,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| ReportError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    tracing::debug!(path = %path.display(), rows = df.height(), "CSV written");
    Ok(())
}

/// Paths of every file written by [`write_outputs`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputFiles {
    pub hits: Vec<PathBuf>,
    pub membership: PathBuf,
    pub summary: PathBuf,
    pub overlap: PathBuf,
}

impl OutputFiles {
    pub fn all(&self) -> Vec<&Path> {
        self.hits
            .iter()
            .map(PathBuf::as_path)
            .chain([
                self.membership.as_path(),
                self.summary.as_path(),
                self.overlap.as_path(),
            ])
            .collect()
    }
}

/// Write hit tables, the membership table and both summaries to `dir`.
pub fn write_outputs(
    dir: &Path,
    evaluations: &[Evaluation],
    table: &CohortTable,
    stats: &[CohortStatistics],
    overlap: &OverlapMatrix,
) -> Result<OutputFiles> {
    fs::create_dir_all(dir).map_err(|e| ReportError::Create {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = OutputFiles::default();
    for evaluation in evaluations {
        let path = dir.join(hits_file_name(&evaluation.label));
        write_csv(&mut hits_frame(&evaluation.hits)?, &path)?;
        files.hits.push(path);
    }

    files.membership = dir.join(MEMBERSHIP_FILE);
    write_csv(&mut membership_frame(table)?, &files.membership)?;
    files.summary = dir.join(SUMMARY_FILE);
    write_csv(&mut statistics_frame(stats)?, &files.summary)?;
    files.overlap = dir.join(OVERLAP_FILE);
    write_csv(&mut overlap_frame(overlap)?, &files.overlap)?;

    Ok(files)
}
