//! Aggregated cohort membership types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::hit::CohortLabel;
use crate::patient::{Gender, PatientKey};

/// Leading columns of the membership table, ahead of one column per
/// activity covariate.
pub const MEMBERSHIP_COLUMNS: [&str; 9] = [
    LABEL_COLUMN,
    "patient_id",
    "index_date",
    "date_criterion",
    "hit_count",
    "age",
    "gender",
    "index_creation_date",
    "in_patient_index",
];

/// Column naming the cohort in the membership, statistics and overlap
/// tables. The overlap table also has one column per label.
pub const LABEL_COLUMN: &str = "cohort_label";

/// Count of events for one key in one activity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCount {
    pub key: PatientKey,
    pub count: u64,
}

/// One denormalized row of the unified cohort table.
///
/// `activity` is aligned with [`CohortTable::activity_names`]. `None`
/// means the key had no rows in that source within the window, which is
/// deliberately different from a confirmed zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMembershipRow {
    pub cohort_label: CohortLabel,
    pub key: PatientKey,
    /// Earliest qualifying event date for this cohort.
    pub date_criterion: NaiveDate,
    /// Deduplicated hits collapsed into this row.
    pub hit_count: usize,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub index_creation_date: Option<NaiveDate>,
    /// False when the key has no row in the patient index.
    pub in_patient_index: bool,
    pub activity: Vec<Option<u64>>,
}

/// The unified cohort membership table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortTable {
    pub activity_names: Vec<String>,
    pub rows: Vec<CohortMembershipRow>,
}

impl CohortTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for<'a>(
        &'a self,
        label: &'a CohortLabel,
    ) -> impl Iterator<Item = &'a CohortMembershipRow> + 'a {
        self.rows.iter().filter(move |row| &row.cohort_label == label)
    }

    /// Position of an activity covariate by name.
    pub fn activity_position(&self, name: &str) -> Option<usize> {
        self.activity_names.iter().position(|n| n == name)
    }

    /// Distinct labels in first-seen order.
    pub fn labels(&self) -> Vec<CohortLabel> {
        let mut labels: Vec<CohortLabel> = Vec::new();
        for row in &self.rows {
            if !labels.contains(&row.cohort_label) {
                labels.push(row.cohort_label.clone());
            }
        }
        labels
    }
}
