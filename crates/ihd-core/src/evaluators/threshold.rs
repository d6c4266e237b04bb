//! Numeric lab threshold criteria.
//!
//! Rows are selected by test name, their value must pass strict format
//! validation, and a hit is kept only when the comparison against the
//! cutoff holds. Values that fail validation are counted as malformed and
//! never compared.

use ihd_criteria::{CriteriaWarning, ThresholdCriterion};
use ihd_ingest::SourceTables;
use ihd_model::{CohortLabel, PatientIndex};

use crate::dedupe::HitSet;
use crate::error::EvaluationError;
use crate::evaluators::{
    CriterionEvaluator, Evaluation, EvaluatorConfig, EvaluatorKind, ScanStats, empty_source,
    finish,
};
use crate::numeric::validate_numeric;
use crate::source::{EventSource, required_column};

pub struct ThresholdEvaluator {
    criterion: ThresholdCriterion,
    config: EvaluatorConfig,
}

impl ThresholdEvaluator {
    pub fn new(criterion: ThresholdCriterion, config: EvaluatorConfig) -> Self {
        Self { criterion, config }
    }

    /// Whether a raw result value is a valid number beyond the cutoff.
    pub fn exceeds(&self, raw_value: &str) -> Option<bool> {
        validate_numeric(raw_value, self.criterion.format)
            .map(|value| self.criterion.comparison.holds(value, self.criterion.cutoff))
    }
}

impl CriterionEvaluator for ThresholdEvaluator {
    fn label(&self) -> &CohortLabel {
        &self.criterion.label
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Threshold
    }

    fn source(&self) -> &str {
        &self.criterion.source
    }

    fn evaluate(
        &self,
        tables: &SourceTables,
        patient_index: &PatientIndex,
    ) -> Result<Evaluation, EvaluationError> {
        let label = self.criterion.label.as_str();
        let source_name = self.criterion.source.as_str();
        let Some(df) = tables.get(source_name).filter(|df| df.height() > 0) else {
            return Ok(empty_source(
                &self.criterion.label,
                EvaluatorKind::Threshold,
                source_name,
            ));
        };
        let source = EventSource::open(
            df,
            label,
            source_name,
            &self.config.key_columns,
            &self.criterion.date_column,
        )?;
        let test_names = required_column(df, label, source_name, &self.criterion.test_name_column)?;
        let values = required_column(df, label, source_name, &self.criterion.value_column)?;

        let mut stats = ScanStats {
            rows_scanned: source.height(),
            ..ScanStats::default()
        };
        let mut hits = HitSet::new();
        let mut tests_seen = 0usize;

        for idx in 0..source.height() {
            let is_test = test_names
                .get(idx)
                .is_some_and(|name| self.criterion.test_pattern.is_match(name));
            if !is_test {
                continue;
            }
            tests_seen += 1;
            match values.get(idx).and_then(|raw| self.exceeds(raw)) {
                None => stats.rows_malformed += 1,
                Some(false) => {}
                Some(true) => {
                    stats.rows_matched += 1;
                    source.emit(
                        idx,
                        patient_index,
                        &self.config.window,
                        &mut stats,
                        &mut hits,
                    );
                }
            }
        }

        let mut warnings = Vec::new();
        if tests_seen == 0 {
            warnings.push(CriteriaWarning::PatternMatchedNothing {
                label: label.to_string(),
                field: self.criterion.test_name_column.clone(),
                pattern: self.criterion.test_pattern.pattern.clone(),
            });
        }
        tracing::debug!(
            criterion = label,
            tests = tests_seen,
            cutoff = self.criterion.cutoff,
            comparison = %self.criterion.comparison,
            "threshold scan complete"
        );

        Ok(finish(
            &self.criterion.label,
            EvaluatorKind::Threshold,
            source_name,
            hits,
            stats,
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ihd_criteria::{CompiledPattern, Comparison, NumericFormat};
    use ihd_model::{PatientKey, PatientRecord};
    use polars::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn troponin(format: NumericFormat) -> ThresholdEvaluator {
        ThresholdEvaluator::new(
            ThresholdCriterion {
                label: CohortLabel::new("troponin").unwrap(),
                source: "lab_results".to_string(),
                date_column: "result_date".to_string(),
                test_name_column: "test_name".to_string(),
                value_column: "result_value".to_string(),
                test_pattern: CompiledPattern::new("troponin", "trop").unwrap(),
                cutoff: 45.0,
                comparison: Comparison::GreaterThan,
                format,
                unit: Some("ng/L".to_string()),
            },
            EvaluatorConfig::default(),
        )
    }

    fn labs(rows: &[(&str, &str, &str)]) -> SourceTables {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1"; rows.len()]).into_column(),
            Series::new("index_date".into(), vec!["2020-01-01"; rows.len()]).into_column(),
            Series::new(
                "result_date".into(),
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(
                "test_name".into(),
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(
                "result_value".into(),
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )
            .into_column(),
        ])
        .unwrap();
        SourceTables::new().with_table("lab_results", df)
    }

    fn index() -> PatientIndex {
        PatientIndex::new(vec![PatientRecord::new(
            PatientKey::new("P1", date(2020, 1, 1)).unwrap(),
        )])
    }

    #[test]
    fn value_equal_to_cutoff_is_not_a_hit() {
        let evaluator = troponin(NumericFormat::Decimal);
        assert_eq!(evaluator.exceeds("45"), Some(false));
        assert_eq!(evaluator.exceeds("45.001"), Some(true));
        assert_eq!(evaluator.exceeds("<5"), None);
        assert_eq!(evaluator.exceeds("trace"), None);
        assert_eq!(evaluator.exceeds("1-2"), None);
    }

    #[test]
    fn integer_format_rejects_decimals() {
        let evaluator = troponin(NumericFormat::Integer);
        assert_eq!(evaluator.exceeds("46"), Some(true));
        assert_eq!(evaluator.exceeds("46.0"), None);
    }

    #[test]
    fn scan_counts_and_dedups_same_day_results() {
        let tables = labs(&[
            ("2020-02-01", "Trop T hs", "120"),
            ("2020-02-01", "TROP", "300"),
            ("2020-02-02", "Trop", "45"),
            ("2020-02-03", "Trop", ">2000"),
            ("2020-02-04", "CK-MB", "90"),
            ("2021-06-01", "Trop", "120"),
        ]);
        let evaluation = troponin(NumericFormat::Integer)
            .evaluate(&tables, &index())
            .unwrap();
        assert_eq!(evaluation.hits.len(), 1);
        assert_eq!(evaluation.hits[0].event_date, date(2020, 2, 1));
        assert_eq!(evaluation.stats.rows_matched, 3);
        assert_eq!(evaluation.stats.rows_in_window, 2);
        assert_eq!(evaluation.stats.rows_malformed, 1);
    }

    #[test]
    fn missing_value_column_fails_the_criterion() {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1"]).into_column(),
            Series::new("result_date".into(), vec!["2020-02-01"]).into_column(),
            Series::new("test_name".into(), vec!["Trop"]).into_column(),
        ])
        .unwrap();
        let tables = SourceTables::new().with_table("lab_results", df);
        let err = troponin(NumericFormat::Integer)
            .evaluate(&tables, &index())
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MissingColumn { .. }));
    }
}
