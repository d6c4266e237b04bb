//! Cohort selection engine.
//!
//! Each criterion in a [`ihd_criteria::CriteriaSet`] becomes one
//! [`CriterionEvaluator`] that scans a single source table and emits
//! deduplicated [`ihd_model::CriterionHit`]s inside the temporal window.
//! Evaluators are independent and can run in parallel; the aggregator is
//! the barrier that merges their output with the patient index and the
//! activity summaries into one [`ihd_model::CohortTable`].

pub mod activity;
pub mod aggregate;
pub mod dedupe;
pub mod error;
pub mod evaluators;
pub mod numeric;
pub mod source;
pub mod summary;
pub mod window;

pub use activity::{ActivitySummary, summarize_activities, summarize_activity};
pub use aggregate::{LabeledHits, aggregate};
pub use dedupe::HitSet;
pub use error::EvaluationError;
pub use evaluators::{
    CriterionEvaluator, Evaluation, EvaluatorConfig, EvaluatorFailure, EvaluatorKind,
    EvaluatorSet, LookupEvaluator, PatternEvaluator, ScanStats, ThresholdEvaluator,
};
pub use numeric::validate_numeric;
pub use summary::{CohortStatistics, CovariateSummary, OverlapMatrix, cohort_statistics, median};
pub use window::TemporalWindow;
