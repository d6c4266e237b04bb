//! Code and free-text pattern criteria.
//!
//! A row qualifies when any pattern of any rule matches its field. Every
//! pattern is tried on every row so that patterns which never match can be
//! reported; a row matched by several patterns still counts once.

use ihd_criteria::{CriteriaWarning, PatternCriterion};
use ihd_ingest::{SourceTables, string_column};
use ihd_model::{CohortLabel, PatientIndex};
use polars::prelude::StringChunked;

use crate::dedupe::HitSet;
use crate::error::EvaluationError;
use crate::evaluators::{
    CriterionEvaluator, Evaluation, EvaluatorConfig, EvaluatorKind, ScanStats, empty_source,
    finish,
};
use crate::source::EventSource;

pub struct PatternEvaluator {
    criterion: PatternCriterion,
    config: EvaluatorConfig,
}

impl PatternEvaluator {
    pub fn new(criterion: PatternCriterion, config: EvaluatorConfig) -> Self {
        Self { criterion, config }
    }
}

impl CriterionEvaluator for PatternEvaluator {
    fn label(&self) -> &CohortLabel {
        &self.criterion.label
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Pattern
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
                EvaluatorKind::Pattern,
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

        let mut warnings = Vec::new();
        let mut fields: Vec<(usize, StringChunked)> = Vec::new();
        for (rule_idx, rule) in self.criterion.rules.iter().enumerate() {
            match string_column(df, &rule.field).map_err(|e| EvaluationError::ingest(label, e))? {
                Some(values) => fields.push((rule_idx, values)),
                None => warnings.push(CriteriaWarning::MissingColumn {
                    label: label.to_string(),
                    source_name: source_name.to_string(),
                    column: rule.field.clone(),
                }),
            }
        }
        if fields.is_empty() {
            let column = self
                .criterion
                .rules
                .first()
                .map(|rule| rule.field.clone())
                .unwrap_or_default();
            return Err(EvaluationError::MissingColumn {
                label: label.to_string(),
                source_name: source_name.to_string(),
                column,
            });
        }

        let mut match_counts: Vec<Vec<usize>> = self
            .criterion
            .rules
            .iter()
            .map(|rule| vec![0; rule.patterns.len()])
            .collect();
        let mut stats = ScanStats {
            rows_scanned: source.height(),
            ..ScanStats::default()
        };
        let mut hits = HitSet::new();

        for idx in 0..source.height() {
            let mut matched = false;
            for (rule_idx, values) in &fields {
                let Some(value) = values.get(idx) else {
                    continue;
                };
                let rule = &self.criterion.rules[*rule_idx];
                for (pattern_idx, pattern) in rule.patterns.iter().enumerate() {
                    if pattern.is_match(value) {
                        match_counts[*rule_idx][pattern_idx] += 1;
                        matched = true;
                    }
                }
            }
            if matched {
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

        for (rule_idx, _) in &fields {
            let rule = &self.criterion.rules[*rule_idx];
            for (pattern, count) in rule.patterns.iter().zip(&match_counts[*rule_idx]) {
                if *count == 0 {
                    warnings.push(CriteriaWarning::PatternMatchedNothing {
                        label: label.to_string(),
                        field: rule.field.clone(),
                        pattern: pattern.pattern.clone(),
                    });
                }
            }
        }

        Ok(finish(
            &self.criterion.label,
            EvaluatorKind::Pattern,
            source_name,
            hits,
            stats,
            warnings,
        ))
    }
}
