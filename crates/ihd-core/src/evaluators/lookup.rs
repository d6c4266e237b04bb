//! Reference-list membership criteria.

use std::path::Path;

use ihd_criteria::{
    AllowList, CodeReference, CriteriaWarning, LookupCriterion, load_code_reference,
};
use ihd_ingest::SourceTables;
use ihd_model::{CohortLabel, PatientIndex};

use crate::dedupe::HitSet;
use crate::error::EvaluationError;
use crate::evaluators::{
    CriterionEvaluator, Evaluation, EvaluatorConfig, EvaluatorKind, ScanStats, empty_source,
    finish,
};
use crate::source::{EventSource, required_column};

/// Keeps rows whose code is on the allow-list derived from a reference
/// list minus its excluded categories.
pub struct LookupEvaluator {
    criterion: LookupCriterion,
    config: EvaluatorConfig,
    allow_list: AllowList,
    /// Raised while building the allow-list, repeated on every evaluation.
    build_warnings: Vec<CriteriaWarning>,
}

impl LookupEvaluator {
    pub fn new(
        criterion: LookupCriterion,
        config: EvaluatorConfig,
        reference: &CodeReference,
    ) -> Result<Self, EvaluationError> {
        let (allow_list, build_warnings) = AllowList::build(
            criterion.label.as_str(),
            reference,
            &criterion.excluded_categories,
        )
        .map_err(|source| EvaluationError::Criteria {
            label: criterion.label.to_string(),
            source,
        })?;
        tracing::debug!(
            criterion = %criterion.label,
            allowed = allow_list.len(),
            excluded = allow_list.excluded_len(),
            "allow-list built"
        );
        Ok(Self {
            criterion,
            config,
            allow_list,
            build_warnings,
        })
    }

    /// Load the criterion's reference file from `dir` and build the
    /// allow-list.
    pub fn from_reference_dir(
        criterion: LookupCriterion,
        config: EvaluatorConfig,
        dir: &Path,
    ) -> Result<Self, EvaluationError> {
        let path = dir.join(&criterion.reference_file);
        let reference = load_code_reference(
            &path,
            &criterion.reference_code_column,
            &criterion.reference_category_column,
        )
        .map_err(|source| EvaluationError::Criteria {
            label: criterion.label.to_string(),
            source,
        })?;
        Self::new(criterion, config, &reference)
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }
}

impl CriterionEvaluator for LookupEvaluator {
    fn label(&self) -> &CohortLabel {
        &self.criterion.label
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Lookup
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
            let mut evaluation =
                empty_source(&self.criterion.label, EvaluatorKind::Lookup, source_name);
            evaluation.warnings.extend(self.build_warnings.iter().cloned());
            return Ok(evaluation);
        };
        let source = EventSource::open(
            df,
            label,
            source_name,
            &self.config.key_columns,
            &self.criterion.date_column,
        )?;
        let codes = required_column(df, label, source_name, &self.criterion.code_column)?;

        let mut stats = ScanStats {
            rows_scanned: source.height(),
            ..ScanStats::default()
        };
        let mut hits = HitSet::new();
        let mut excluded_rows = 0usize;

        for idx in 0..source.height() {
            let Some(code) = codes.get(idx) else {
                continue;
            };
            if !self.allow_list.contains(code) {
                if self.allow_list.is_excluded(code) {
                    excluded_rows += 1;
                }
                continue;
            }
            stats.rows_matched += 1;
            source.emit(
                idx,
                patient_index,
                &self.config.window,
                &mut stats,
                &mut hits,
            );
        }
        tracing::debug!(criterion = label, excluded_rows, "lookup scan complete");

        Ok(finish(
            &self.criterion.label,
            EvaluatorKind::Lookup,
            source_name,
            hits,
            stats,
            self.build_warnings.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ihd_criteria::ReferenceEntry;
    use ihd_model::{PatientKey, PatientRecord};
    use polars::prelude::*;

    fn criterion(excluded: &[&str]) -> LookupCriterion {
        LookupCriterion {
            label: CohortLabel::new("procedure").unwrap(),
            source: "procedures".to_string(),
            date_column: "procedure_date".to_string(),
            code_column: "procedure_code".to_string(),
            reference_file: "procedure_codes.csv".to_string(),
            reference_code_column: "code".to_string(),
            reference_category_column: "category".to_string(),
            excluded_categories: excluded.iter().map(ToString::to_string).collect(),
        }
    }

    fn reference() -> CodeReference {
        let entry = |code: &str, category: &str| ReferenceEntry {
            code: code.to_string(),
            category: category.to_string(),
        };
        CodeReference::new(vec![
            entry("335010", "PCI"),
            entry("335020", "CABG"),
            entry("339900", "cardioversie"),
        ])
    }

    fn index() -> PatientIndex {
        PatientIndex::new(vec![PatientRecord::new(
            PatientKey::new("P1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).unwrap(),
        )])
    }

    fn procedures() -> SourceTables {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1", "P1", "P1"]).into_column(),
            Series::new("index_date".into(), vec!["2020-01-01"; 3]).into_column(),
            Series::new(
                "procedure_date".into(),
                vec!["2020-01-10", "2020-01-11", "2020-01-12"],
            )
            .into_column(),
            Series::new("procedure_code".into(), vec!["335010", "339900", "999999"])
                .into_column(),
        ])
        .unwrap();
        SourceTables::new().with_table("procedures", df)
    }

    #[test]
    fn excluded_category_never_produces_hits() {
        let evaluator =
            LookupEvaluator::new(criterion(&["cardioversie"]), EvaluatorConfig::default(), &reference())
                .unwrap();
        let evaluation = evaluator.evaluate(&procedures(), &index()).unwrap();
        let dates: Vec<NaiveDate> = evaluation.hits.iter().map(|h| h.event_date).collect();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2020, 1, 10).unwrap()]);
        assert!(evaluation.warnings.is_empty());
    }

    #[test]
    fn without_exclusions_the_whole_reference_list_counts() {
        let evaluator =
            LookupEvaluator::new(criterion(&[]), EvaluatorConfig::default(), &reference()).unwrap();
        let evaluation = evaluator.evaluate(&procedures(), &index()).unwrap();
        assert_eq!(evaluation.hits.len(), 2);
    }

    #[test]
    fn unknown_category_warning_travels_with_the_evaluation() {
        let evaluator = LookupEvaluator::new(
            criterion(&["harttransplantatie"]),
            EvaluatorConfig::default(),
            &reference(),
        )
        .unwrap();
        let evaluation = evaluator.evaluate(&procedures(), &index()).unwrap();
        assert!(matches!(
            evaluation.warnings.as_slice(),
            [CriteriaWarning::UnknownExclusionCategory { .. }]
        ));
    }

    #[test]
    fn missing_reference_file_fails_construction() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = LookupEvaluator::from_reference_dir(
            criterion(&[]),
            EvaluatorConfig::default(),
            dir.path(),
        );
        assert!(matches!(result, Err(EvaluationError::Criteria { .. })));
    }
}
