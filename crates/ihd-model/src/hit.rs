use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::patient::PatientKey;

/// Name of the criterion (and thus cohort) a hit belongs to.
///
/// Labels double as output file stems, so they are restricted to ASCII
/// letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CohortLabel(String);

impl CohortLabel {
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyLabel);
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Err(ModelError::InvalidLabel(label));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CohortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CohortLabel {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CohortLabel> for String {
    fn from(label: CohortLabel) -> Self {
        label.0
    }
}

/// A single qualifying event for one criterion.
///
/// Ordering is by key, then event date, then flag, which is also the order
/// in which hit tables are written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CriterionHit {
    pub key: PatientKey,
    pub event_date: NaiveDate,
    pub flag: bool,
}

impl CriterionHit {
    pub fn new(key: PatientKey, event_date: NaiveDate) -> Self {
        Self {
            key,
            event_date,
            flag: true,
        }
    }

    /// Days between the index date and the event date.
    pub fn date_diff(&self) -> i64 {
        (self.event_date - self.key.index_date).num_days()
    }
}
