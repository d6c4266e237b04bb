//! Per-cohort descriptive statistics and pairwise overlap.
//!
//! Statistics are computed per distinct (patient_id, index_date) key so
//! that rows duplicated by the patient-index join do not weigh twice. For
//! a key joined to several index rows the first row's demographics are
//! used.

use std::collections::{BTreeMap, BTreeSet};

use ihd_model::{CohortLabel, CohortMembershipRow, CohortTable, PatientKey};
use serde::Serialize;

/// Median of a set of values; the mean of the two middle values for an
/// even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Summary of one activity covariate within a cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovariateSummary {
    pub name: String,
    pub median: Option<f64>,
    /// Keys without a value for this covariate.
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortStatistics {
    pub label: CohortLabel,
    pub patients: usize,
    /// Distinct (patient_id, index_date) keys.
    pub keys: usize,
    /// Deduplicated hits over all keys.
    pub hits: usize,
    /// Rows in the unified table, including join duplicates.
    pub rows: usize,
    pub keys_without_index_row: usize,
    pub mean_age: Option<f64>,
    pub median_age: Option<f64>,
    /// Gender name to key count; `missing` for unknown gender values.
    pub genders: BTreeMap<String, usize>,
    pub covariates: Vec<CovariateSummary>,
}

fn first_row_per_key<'a>(
    rows: impl Iterator<Item = &'a CohortMembershipRow>,
) -> BTreeMap<&'a PatientKey, &'a CohortMembershipRow> {
    let mut first = BTreeMap::new();
    for row in rows {
        first.entry(&row.key).or_insert(row);
    }
    first
}

/// Statistics for every cohort in the table, in label order of first
/// appearance.
pub fn cohort_statistics(table: &CohortTable) -> Vec<CohortStatistics> {
    table
        .labels()
        .into_iter()
        .map(|label| {
            let rows: Vec<&CohortMembershipRow> = table
                .rows
                .iter()
                .filter(|row| row.cohort_label == label)
                .collect();
            let per_key = first_row_per_key(rows.iter().copied());
            let patients: BTreeSet<&str> = per_key
                .keys()
                .map(|key| key.patient_id.as_str())
                .collect();
            let ages: Vec<f64> = per_key
                .values()
                .filter_map(|row| row.age.map(f64::from))
                .collect();
            let mut genders: BTreeMap<String, usize> = BTreeMap::new();
            for row in per_key.values() {
                let name = row.gender.map_or("missing", |g| g.as_str());
                *genders.entry(name.to_string()).or_default() += 1;
            }
            let covariates = table
                .activity_names
                .iter()
                .enumerate()
                .map(|(pos, name)| {
                    let values: Vec<f64> = per_key
                        .values()
                        .filter_map(|row| row.activity.get(pos).copied().flatten())
                        .map(|count| count as f64)
                        .collect();
                    CovariateSummary {
                        name: name.clone(),
                        median: median(&values),
                        missing: per_key.len() - values.len(),
                    }
                })
                .collect();

            CohortStatistics {
                patients: patients.len(),
                keys: per_key.len(),
                hits: per_key.values().map(|row| row.hit_count).sum(),
                rows: rows.len(),
                keys_without_index_row: per_key
                    .values()
                    .filter(|row| !row.in_patient_index)
                    .count(),
                mean_age: mean(&ages),
                median_age: median(&ages),
                genders,
                covariates,
                label,
            }
        })
        .collect()
}

/// Pairwise count of keys shared by two cohorts.
///
/// The diagonal holds each cohort's own key count. `union` counts keys in
/// at least one cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapMatrix {
    pub labels: Vec<CohortLabel>,
    pub counts: Vec<Vec<usize>>,
    pub union: usize,
}

impl OverlapMatrix {
    pub fn from_table(table: &CohortTable) -> Self {
        let labels = table.labels();
        let sets: Vec<BTreeSet<&PatientKey>> = labels
            .iter()
            .map(|label| {
                table
                    .rows
                    .iter()
                    .filter(|row| &row.cohort_label == label)
                    .map(|row| &row.key)
                    .collect()
            })
            .collect();
        let counts = sets
            .iter()
            .map(|a| sets.iter().map(|b| a.intersection(b).count()).collect())
            .collect();
        let union = sets
            .iter()
            .flat_map(|set| set.iter().copied())
            .collect::<BTreeSet<_>>()
            .len();
        Self {
            labels,
            counts,
            union,
        }
    }

    pub fn get(&self, a: &CohortLabel, b: &CohortLabel) -> Option<usize> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.counts[i][j])
    }
}
