//! Row access and key resolution for event tables.
//!
//! An event table either carries its own index date column, in which case
//! each row belongs to exactly one (patient_id, index_date) key, or it only
//! carries the patient id. In the second case a row is attributed to every
//! index date registered for that patient, and the window then decides
//! which of those keys the event counts for.

use chrono::NaiveDate;
use ihd_criteria::definition::KeyColumns;
use ihd_ingest::{parse_date, string_column};
use ihd_model::{CriterionHit, PatientIndex, PatientKey};
use polars::prelude::*;

use crate::dedupe::HitSet;
use crate::error::EvaluationError;
use crate::evaluators::ScanStats;
use crate::window::TemporalWindow;

pub(crate) fn required_column(
    df: &DataFrame,
    label: &str,
    source_name: &str,
    column: &str,
) -> Result<StringChunked, EvaluationError> {
    string_column(df, column)
        .map_err(|e| EvaluationError::ingest(label, e))?
        .ok_or_else(|| EvaluationError::MissingColumn {
            label: label.to_string(),
            source_name: source_name.to_string(),
            column: column.to_string(),
        })
}

/// An event table opened for one criterion.
#[derive(Debug, Clone)]
pub struct EventSource {
    ids: StringChunked,
    index_dates: Option<StringChunked>,
    event_dates: StringChunked,
    height: usize,
}

impl EventSource {
    /// Open the key and event date columns of a table.
    ///
    /// The patient id and event date columns are required; the index date
    /// column is optional.
    pub fn open(
        df: &DataFrame,
        label: &str,
        source_name: &str,
        key_columns: &KeyColumns,
        date_column: &str,
    ) -> Result<Self, EvaluationError> {
        let ids = required_column(df, label, source_name, &key_columns.patient_id)?;
        let event_dates = required_column(df, label, source_name, date_column)?;
        let index_dates = string_column(df, &key_columns.index_date)
            .map_err(|e| EvaluationError::ingest(label, e))?;
        if index_dates.is_none() {
            tracing::debug!(
                criterion = label,
                source = source_name,
                "no index date column, resolving keys through the patient index"
            );
        }
        Ok(Self {
            ids,
            index_dates,
            event_dates,
            height: df.height(),
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether keys are resolved through the patient index.
    pub fn resolves_through_index(&self) -> bool {
        self.index_dates.is_none()
    }

    pub fn event_date(&self, idx: usize) -> Option<NaiveDate> {
        self.event_dates.get(idx).and_then(parse_date)
    }

    /// Candidate keys for a row.
    ///
    /// `None` when the row's own key is unusable. An empty list means the
    /// patient has no index date in the patient index.
    pub fn keys(&self, idx: usize, patient_index: &PatientIndex) -> Option<Vec<PatientKey>> {
        let patient_id = self.ids.get(idx)?.trim();
        if patient_id.is_empty() {
            return None;
        }
        match &self.index_dates {
            Some(index_dates) => {
                let index_date = index_dates.get(idx).and_then(parse_date)?;
                PatientKey::new(patient_id, index_date).ok().map(|key| vec![key])
            }
            None => Some(
                patient_index
                    .index_dates(patient_id)
                    .iter()
                    .filter_map(|&date| PatientKey::new(patient_id, date).ok())
                    .collect(),
            ),
        }
    }

    /// Emit hits for a row that satisfied its criterion.
    ///
    /// Rows with an unusable date or key are counted as malformed; the
    /// window is applied per candidate key.
    pub(crate) fn emit(
        &self,
        idx: usize,
        patient_index: &PatientIndex,
        window: &TemporalWindow,
        stats: &mut ScanStats,
        hits: &mut HitSet,
    ) {
        let (Some(event_date), Some(keys)) = (self.event_date(idx), self.keys(idx, patient_index))
        else {
            stats.rows_malformed += 1;
            return;
        };
        if keys.is_empty() {
            stats.rows_unresolved += 1;
            return;
        }
        let mut in_window = false;
        for key in keys {
            if window.contains(event_date, key.index_date) {
                in_window = true;
                hits.insert(CriterionHit::new(key, event_date));
            }
        }
        if in_window {
            stats.rows_in_window += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ihd_model::PatientRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn index() -> PatientIndex {
        PatientIndex::new(vec![
            PatientRecord::new(PatientKey::new("P1", date(2020, 1, 1)).unwrap()),
            PatientRecord::new(PatientKey::new("P1", date(2020, 6, 1)).unwrap()),
        ])
    }

    #[test]
    fn keys_resolve_through_index_without_index_column() {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1", "P9"]).into_column(),
            Series::new("event_date".into(), vec!["2020-07-01", "2020-07-01"]).into_column(),
        ])
        .unwrap();
        let source =
            EventSource::open(&df, "dbc", "dbc", &KeyColumns::default(), "event_date").unwrap();
        assert!(source.resolves_through_index());
        assert_eq!(source.keys(0, &index()).unwrap().len(), 2);
        assert_eq!(source.keys(1, &index()), Some(Vec::new()));

        let mut stats = ScanStats::default();
        let mut hits = HitSet::new();
        source.emit(0, &index(), &TemporalWindow::default(), &mut stats, &mut hits);
        source.emit(1, &index(), &TemporalWindow::default(), &mut stats, &mut hits);
        assert_eq!(hits.len(), 2);
        assert_eq!(stats.rows_in_window, 1);
        assert_eq!(stats.rows_unresolved, 1);
    }

    #[test]
    fn own_index_column_yields_one_key() {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec![Some("P1"), Some("P1"), None]).into_column(),
            Series::new("index_date".into(), vec![Some("2020-01-01"), Some("bad"), Some("2020-01-01")])
                .into_column(),
            Series::new("event_date".into(), vec!["2020-01-02", "2020-01-02", "2020-01-02"])
                .into_column(),
        ])
        .unwrap();
        let source =
            EventSource::open(&df, "dx", "diagnoses", &KeyColumns::default(), "event_date")
                .unwrap();
        assert_eq!(
            source.keys(0, &index()),
            Some(vec![PatientKey::new("P1", date(2020, 1, 1)).unwrap()])
        );
        assert_eq!(source.keys(1, &index()), None);
        assert_eq!(source.keys(2, &index()), None);
    }

    #[test]
    fn missing_date_column_is_reported() {
        let df = DataFrame::new(vec![
            Series::new("patient_id".into(), vec!["P1"]).into_column(),
        ])
        .unwrap();
        let err = EventSource::open(&df, "dx", "diagnoses", &KeyColumns::default(), "event_date")
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MissingColumn { ref column, .. } if column == "event_date"));
    }
}
