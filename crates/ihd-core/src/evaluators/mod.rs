//! Criterion evaluators and the set that runs them.
//!
//! # Architecture
//!
//! The [`CriterionEvaluator`] trait is the seam between the compiled
//! criteria and the source tables. Each evaluator owns its configuration
//! (criterion, window, key columns) from construction and is run against
//! the shared, read-only tables. [`EvaluatorSet`] builds one evaluator per
//! criterion and runs them, in parallel when asked, collecting successes
//! and failures separately so one broken criterion does not stop the rest.

mod lookup;
mod pattern;
mod threshold;

use std::path::Path;

use ihd_criteria::definition::KeyColumns;
use ihd_criteria::{CriteriaSet, CriteriaWarning};
use ihd_ingest::SourceTables;
use ihd_model::{CohortLabel, CriterionHit, PatientIndex};
use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::LabeledHits;
use crate::dedupe::HitSet;
use crate::error::EvaluationError;
use crate::window::TemporalWindow;

pub use lookup::LookupEvaluator;
pub use pattern::PatternEvaluator;
pub use threshold::ThresholdEvaluator;

/// Settings shared by every evaluator of a run.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    pub window: TemporalWindow,
    pub key_columns: KeyColumns,
}

impl EvaluatorConfig {
    pub fn from_criteria(criteria: &CriteriaSet) -> Self {
        Self {
            window: criteria.window.into(),
            key_columns: criteria.key_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Pattern,
    Threshold,
    Lookup,
}

impl EvaluatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Threshold => "threshold",
            Self::Lookup => "lookup",
        }
    }
}

/// Row counters collected while scanning a source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub rows_scanned: usize,
    /// Rows satisfying the criterion itself, before date checks.
    pub rows_matched: usize,
    /// Rows excluded for an unusable date, key or value.
    pub rows_malformed: usize,
    /// Rows whose patient has no index date in the patient index.
    pub rows_unresolved: usize,
    /// Matched rows inside the window for at least one key.
    pub rows_in_window: usize,
    pub hits: usize,
    pub unique_patients: usize,
}

/// Output of one evaluator.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub label: CohortLabel,
    pub kind: EvaluatorKind,
    pub source: String,
    /// Deduplicated hits sorted by key and event date.
    pub hits: Vec<CriterionHit>,
    pub stats: ScanStats,
    pub warnings: Vec<CriteriaWarning>,
}

impl Evaluation {
    /// An evaluation without hits, e.g. for a missing source table.
    pub fn empty(label: CohortLabel, kind: EvaluatorKind, source: &str) -> Self {
        Self {
            label,
            kind,
            source: source.to_string(),
            hits: Vec::new(),
            stats: ScanStats::default(),
            warnings: Vec::new(),
        }
    }

    pub fn labeled(&self) -> LabeledHits<'_> {
        LabeledHits {
            label: &self.label,
            hits: &self.hits,
        }
    }
}

/// A criterion that scans one source table for qualifying events.
pub trait CriterionEvaluator: Send + Sync {
    fn label(&self) -> &CohortLabel;

    fn kind(&self) -> EvaluatorKind;

    /// Configured source table name.
    fn source(&self) -> &str;

    /// Scan the source table and emit deduplicated in-window hits.
    ///
    /// A source table that is absent from `tables` yields an empty
    /// evaluation with a [`CriteriaWarning::EmptySource`] warning.
    fn evaluate(
        &self,
        tables: &SourceTables,
        patient_index: &PatientIndex,
    ) -> Result<Evaluation, EvaluationError>;
}

/// An evaluator that could not be built or failed while running.
#[derive(Debug)]
pub struct EvaluatorFailure {
    pub label: String,
    pub source: String,
    pub error: EvaluationError,
}

/// All evaluators for one criteria set.
#[derive(Default)]
pub struct EvaluatorSet {
    evaluators: Vec<Box<dyn CriterionEvaluator>>,
}

impl EvaluatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one evaluator per criterion.
    ///
    /// Lookup reference files are resolved against `reference_dir`. A
    /// criterion whose evaluator cannot be built is returned as a failure
    /// and left out of the set.
    pub fn build(criteria: &CriteriaSet, reference_dir: &Path) -> (Self, Vec<EvaluatorFailure>) {
        let config = EvaluatorConfig::from_criteria(criteria);
        let mut set = Self::new();
        let mut failures = Vec::new();
        for criterion in &criteria.patterns {
            set.push(Box::new(PatternEvaluator::new(
                criterion.clone(),
                config.clone(),
            )));
        }
        for criterion in &criteria.thresholds {
            set.push(Box::new(ThresholdEvaluator::new(
                criterion.clone(),
                config.clone(),
            )));
        }
        for criterion in &criteria.lookups {
            match LookupEvaluator::from_reference_dir(
                criterion.clone(),
                config.clone(),
                reference_dir,
            ) {
                Ok(evaluator) => set.push(Box::new(evaluator)),
                Err(error) => {
                    tracing::warn!(
                        criterion = %criterion.label,
                        %error,
                        "lookup criterion disabled"
                    );
                    failures.push(EvaluatorFailure {
                        label: criterion.label.to_string(),
                        source: criterion.source.clone(),
                        error,
                    });
                }
            }
        }
        (set, failures)
    }

    pub fn push(&mut self, evaluator: Box<dyn CriterionEvaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    pub fn evaluators(&self) -> impl Iterator<Item = &dyn CriterionEvaluator> + '_ {
        self.evaluators.iter().map(AsRef::as_ref)
    }

    /// Run every evaluator.
    ///
    /// Returns successful evaluations in evaluator order, and failures.
    /// With `parallel` each evaluator runs on its own rayon task.
    pub fn run(
        &self,
        tables: &SourceTables,
        patient_index: &PatientIndex,
        parallel: bool,
    ) -> (Vec<Evaluation>, Vec<EvaluatorFailure>) {
        let run_one = |evaluator: &dyn CriterionEvaluator| {
            let span = tracing::debug_span!(
                "criterion",
                label = %evaluator.label(),
                kind = evaluator.kind().as_str()
            );
            let _guard = span.enter();
            evaluator.evaluate(tables, patient_index).map_err(|error| EvaluatorFailure {
                label: evaluator.label().to_string(),
                source: evaluator.source().to_string(),
                error,
            })
        };
        let results: Vec<Result<Evaluation, EvaluatorFailure>> = if parallel {
            self.evaluators
                .par_iter()
                .map(|evaluator| run_one(evaluator.as_ref()))
                .collect()
        } else {
            self.evaluators
                .iter()
                .map(|evaluator| run_one(evaluator.as_ref()))
                .collect()
        };

        let mut evaluations = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(evaluation) => {
                    for warning in &evaluation.warnings {
                        tracing::warn!(criterion = %evaluation.label, "{warning}");
                    }
                    tracing::info!(
                        criterion = %evaluation.label,
                        rows = evaluation.stats.rows_scanned,
                        matched = evaluation.stats.rows_matched,
                        malformed = evaluation.stats.rows_malformed,
                        hits = evaluation.stats.hits,
                        "criterion evaluated"
                    );
                    evaluations.push(evaluation);
                }
                Err(failure) => {
                    tracing::error!(
                        criterion = %failure.label,
                        error = %failure.error,
                        "criterion failed"
                    );
                    failures.push(failure);
                }
            }
        }
        (evaluations, failures)
    }
}

/// Finish a scan: sort and count hits, add the no-hit warning.
pub(crate) fn finish(
    label: &CohortLabel,
    kind: EvaluatorKind,
    source: &str,
    hits: HitSet,
    mut stats: ScanStats,
    mut warnings: Vec<CriteriaWarning>,
) -> Evaluation {
    stats.hits = hits.len();
    stats.unique_patients = hits.unique_patients();
    if hits.is_empty() && stats.rows_scanned > 0 {
        warnings.push(CriteriaWarning::NoHits {
            label: label.to_string(),
        });
    }
    Evaluation {
        label: label.clone(),
        kind,
        source: source.to_string(),
        hits: hits.into_sorted_vec(),
        stats,
        warnings,
    }
}

/// Empty evaluation for a source table that is absent or has no rows.
pub(crate) fn empty_source(label: &CohortLabel, kind: EvaluatorKind, source: &str) -> Evaluation {
    let mut evaluation = Evaluation::empty(label.clone(), kind, source);
    evaluation.warnings.push(CriteriaWarning::EmptySource {
        label: label.to_string(),
        source_name: source.to_string(),
    });
    evaluation
}
