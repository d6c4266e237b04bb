//! Patient index types.
//!
//! A patient may be registered with more than one index date, so the
//! matching identity throughout the engine is [`PatientKey`], never the
//! bare `patient_id`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Matching identity: one patient anchored to one index date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientKey {
    pub patient_id: String,
    pub index_date: NaiveDate,
}

impl PatientKey {
    /// Create a key, trimming the identifier.
    pub fn new(patient_id: impl AsRef<str>, index_date: NaiveDate) -> Result<Self> {
        let patient_id = patient_id.as_ref().trim();
        if patient_id.is_empty() {
            return Err(ModelError::EmptyPatientId);
        }
        Ok(Self {
            patient_id: patient_id.to_string(),
            index_date,
        })
    }
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.patient_id, self.index_date)
    }
}

/// Administrative gender as recorded in the source extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    /// Parse a gender code.
    ///
    /// Accepts English and Dutch spellings (`M`, `man`, `V`, `vrouw`,
    /// `F`, `female`). Blank input is `None`; anything else is
    /// [`Gender::Other`].
    pub fn from_code(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let gender = match trimmed.to_lowercase().as_str() {
            "m" | "male" | "man" | "mannelijk" => Self::Male,
            "f" | "v" | "female" | "vrouw" | "vrouwelijk" => Self::Female,
            "u" | "unknown" | "onbekend" | "o" => Self::Unknown,
            _ => Self::Other,
        };
        Some(gender)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the patient index with optional demographics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub key: PatientKey,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub index_creation_date: Option<NaiveDate>,
}

impl PatientRecord {
    pub fn new(key: PatientKey) -> Self {
        Self {
            key,
            age: None,
            gender: None,
            index_creation_date: None,
        }
    }
}

/// The patient index: every row in source order, plus key lookups.
///
/// Duplicate keys are kept. The aggregator joins against all of them so
/// that duplicated source rows stay visible instead of being collapsed.
#[derive(Debug, Clone, Default)]
pub struct PatientIndex {
    records: Vec<PatientRecord>,
    by_key: BTreeMap<PatientKey, Vec<usize>>,
    by_patient: BTreeMap<String, Vec<NaiveDate>>,
}

impl PatientIndex {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        let mut by_key: BTreeMap<PatientKey, Vec<usize>> = BTreeMap::new();
        let mut by_patient: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            by_key.entry(record.key.clone()).or_default().push(idx);
            let dates = by_patient.entry(record.key.patient_id.clone()).or_default();
            if !dates.contains(&record.key.index_date) {
                dates.push(record.key.index_date);
            }
        }
        for dates in by_patient.values_mut() {
            dates.sort_unstable();
        }
        Self {
            records,
            by_key,
            by_patient,
        }
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct (patient_id, index_date) pairs.
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// Number of rows sharing a key with at least one other row.
    pub fn duplicate_row_count(&self) -> usize {
        self.by_key
            .values()
            .filter(|rows| rows.len() > 1)
            .map(Vec::len)
            .sum()
    }

    /// All index rows for a key, in source order.
    pub fn lookup(&self, key: &PatientKey) -> Vec<&PatientRecord> {
        self.by_key
            .get(key)
            .map(|rows| rows.iter().map(|&idx| &self.records[idx]).collect())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &PatientKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Distinct index dates registered for a patient, ascending.
    pub fn index_dates(&self, patient_id: &str) -> &[NaiveDate] {
        self.by_patient
            .get(patient_id.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &PatientKey> + '_ {
        self.by_key.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn key_rejects_blank_patient_id() {
        assert!(matches!(
            PatientKey::new("  ", date(2020, 1, 1)),
            Err(ModelError::EmptyPatientId)
        ));
    }

    #[test]
    fn gender_codes() {
        assert_eq!(Gender::from_code("V"), Some(Gender::Female));
        assert_eq!(Gender::from_code("man"), Some(Gender::Male));
        assert_eq!(Gender::from_code("x"), Some(Gender::Other));
        assert_eq!(Gender::from_code(""), None);
    }

    #[test]
    fn index_keeps_duplicate_rows() {
        let key = PatientKey::new("P1", date(2020, 1, 1)).unwrap();
        let index = PatientIndex::new(vec![
            PatientRecord::new(key.clone()),
            PatientRecord::new(key.clone()),
            PatientRecord::new(PatientKey::new("P1", date(2021, 1, 1)).unwrap()),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.key_count(), 2);
        assert_eq!(index.lookup(&key).len(), 2);
        assert_eq!(index.duplicate_row_count(), 2);
        assert_eq!(index.index_dates("P1"), &[date(2020, 1, 1), date(2021, 1, 1)]);
    }
}
