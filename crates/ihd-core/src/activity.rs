//! Per-key activity covariates.
//!
//! An activity summary counts, for every (patient_id, index_date) key, the
//! rows of one source table inside the window, or the distinct values of
//! one column among those rows. Keys without any in-window row are absent
//! from the summary; the aggregator turns that absence into a missing
//! covariate, never into zero.

use std::collections::{BTreeMap, BTreeSet};

use ihd_criteria::ActivityDefinition;
use ihd_ingest::{SourceTables, string_column};
use ihd_model::{ActivityCount, PatientIndex, PatientKey};

use crate::error::EvaluationError;
use crate::evaluators::EvaluatorConfig;
use crate::source::EventSource;

/// Counts for one activity covariate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySummary {
    pub name: String,
    /// False when the source table was not loaded.
    pub available: bool,
    pub counts: BTreeMap<PatientKey, u64>,
}

impl ActivitySummary {
    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            counts: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &PatientKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn rows(&self) -> Vec<ActivityCount> {
        self.counts
            .iter()
            .map(|(key, &count)| ActivityCount {
                key: key.clone(),
                count,
            })
            .collect()
    }
}

/// Summarize one activity source under the run's window.
pub fn summarize_activity(
    definition: &ActivityDefinition,
    tables: &SourceTables,
    patient_index: &PatientIndex,
    config: &EvaluatorConfig,
) -> Result<ActivitySummary, EvaluationError> {
    let Some(df) = tables.get(&definition.source) else {
        tracing::warn!(
            activity = %definition.name,
            source = %definition.source,
            "activity source not loaded, covariate will be missing"
        );
        return Ok(ActivitySummary::unavailable(&definition.name));
    };
    let source = EventSource::open(
        df,
        &definition.name,
        &definition.source,
        &config.key_columns,
        &definition.date_column,
    )?;
    let distinct = match &definition.distinct_column {
        Some(column) => Some(
            string_column(df, column)
                .map_err(|e| EvaluationError::ingest(&definition.name, e))?
                .ok_or_else(|| EvaluationError::MissingColumn {
                    label: definition.name.clone(),
                    source_name: definition.source.clone(),
                    column: column.clone(),
                })?,
        ),
        None => None,
    };

    let mut rows: BTreeMap<PatientKey, u64> = BTreeMap::new();
    let mut values: BTreeMap<PatientKey, BTreeSet<String>> = BTreeMap::new();
    for idx in 0..source.height() {
        let Some(event_date) = source.event_date(idx) else {
            continue;
        };
        let Some(keys) = source.keys(idx, patient_index) else {
            continue;
        };
        let value = match &distinct {
            Some(column) => match column.get(idx).map(str::trim).filter(|v| !v.is_empty()) {
                Some(value) => Some(value),
                None => continue,
            },
            None => None,
        };
        for key in keys {
            if !config.window.contains(event_date, key.index_date) {
                continue;
            }
            match value {
                Some(value) => {
                    values
                        .entry(key)
                        .or_default()
                        .insert(value.to_uppercase());
                }
                None => *rows.entry(key).or_default() += 1,
            }
        }
    }
    let counts = if distinct.is_some() {
        values
            .into_iter()
            .map(|(key, set)| (key, set.len() as u64))
            .collect()
    } else {
        rows
    };
    tracing::debug!(activity = %definition.name, keys = counts.len(), "activity summarized");

    Ok(ActivitySummary {
        name: definition.name.clone(),
        available: true,
        counts,
    })
}

/// Summarize every activity definition.
///
/// A failing summary is logged and replaced by an unavailable one, so the
/// covariate is missing for every row instead of aborting aggregation.
pub fn summarize_activities(
    definitions: &[ActivityDefinition],
    tables: &SourceTables,
    patient_index: &PatientIndex,
    config: &EvaluatorConfig,
) -> (Vec<ActivitySummary>, Vec<EvaluationError>) {
    let mut summaries = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();
    for definition in definitions {
        match summarize_activity(definition, tables, patient_index, config) {
            Ok(summary) => summaries.push(summary),
            Err(error) => {
                tracing::warn!(activity = %definition.name, %error, "activity summary failed");
                summaries.push(ActivitySummary::unavailable(&definition.name));
                errors.push(error);
            }
        }
    }
    (summaries, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ihd_model::PatientRecord;
    use polars::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(pid: &str) -> PatientKey {
        PatientKey::new(pid, date(2020, 1, 1)).unwrap()
    }

    fn setup() -> (SourceTables, PatientIndex) {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1", "P1", "P1", "P1", "P2"]).into_column(),
            Series::new("index_date".into(), vec!["2020-01-01"; 5]).into_column(),
            Series::new(
                "result_date".into(),
                vec!["2020-01-05", "2020-01-05", "2020-02-01", "2019-06-01", "2019-06-01"],
            )
            .into_column(),
            Series::new("test_name".into(), vec!["Trop", "trop", "Hb", "Hb", "Hb"]).into_column(),
        ])
        .unwrap();
        let index = PatientIndex::new(vec![
            PatientRecord::new(key("P1")),
            PatientRecord::new(key("P2")),
        ]);
        (SourceTables::new().with_table("lab_results", df), index)
    }

    fn definition(distinct: Option<&str>) -> ActivityDefinition {
        ActivityDefinition {
            name: "labs".to_string(),
            source: "lab_results".to_string(),
            date_column: "result_date".to_string(),
            distinct_column: distinct.map(ToString::to_string),
        }
    }

    #[test]
    fn counts_rows_and_distinct_values_in_window() {
        let (tables, index) = setup();
        let config = EvaluatorConfig::default();

        let rows = summarize_activity(&definition(None), &tables, &index, &config).unwrap();
        assert_eq!(rows.get(&key("P1")), Some(3));

        let panels =
            summarize_activity(&definition(Some("test_name")), &tables, &index, &config).unwrap();
        assert_eq!(panels.get(&key("P1")), Some(2));
    }

    #[test]
    fn key_without_in_window_rows_is_absent() {
        let (tables, index) = setup();
        let summary =
            summarize_activity(&definition(None), &tables, &index, &EvaluatorConfig::default())
                .unwrap();
        assert_eq!(summary.get(&key("P2")), None);
    }

    #[test]
    fn missing_source_makes_the_covariate_unavailable() {
        let (_, index) = setup();
        let (summaries, errors) = summarize_activities(
            &[definition(None)],
            &SourceTables::new(),
            &index,
            &EvaluatorConfig::default(),
        );
        assert!(errors.is_empty());
        assert!(!summaries[0].available);
    }
}
