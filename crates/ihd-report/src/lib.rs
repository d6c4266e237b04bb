//! Output generation for cohort selection runs.
//!
//! - **Hit tables**: one CSV per criterion (`hits_<label>.csv`)
//! - **Cohort membership**: the unified, denormalized table
//! - **Summaries**: per-cohort statistics and the overlap matrix
//! - **Run manifest**: JSON record of criteria, inputs, counts and warnings

mod error;
mod frames;
mod manifest;
mod writer;

pub use error::{ReportError, Result};
pub use frames::{hits_frame, membership_frame, overlap_frame, statistics_frame};
pub use manifest::{
    CriteriaInfo, EvaluationRecord, FailureRecord, InputRecord, RUN_MANIFEST_FILE,
    RUN_MANIFEST_SCHEMA, RUN_MANIFEST_SCHEMA_VERSION, RunManifest, write_run_manifest,
};
pub use writer::{
    MEMBERSHIP_FILE, OVERLAP_FILE, OutputFiles, SUMMARY_FILE, hits_file_name, write_csv,
    write_outputs,
};
