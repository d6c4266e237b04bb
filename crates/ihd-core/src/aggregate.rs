//! Cohort aggregation.
//!
//! Hit streams are concatenated with their cohort label; a patient in two
//! cohorts appears in both. Within one cohort the hits of a key collapse
//! into one row carrying the earliest event date. Each row is then
//! left-joined to the patient index and to every activity summary on
//! (patient_id, index_date).
//!
//! The patient-index join is many-to-many: a key registered on `n` index
//! rows yields `n` output rows per cohort. A key absent from the index
//! yields one row with empty demographics. Activity summaries hold one
//! count per key, so they never multiply rows; a key without a count gets
//! a missing covariate.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ihd_model::{
    CohortLabel, CohortMembershipRow, CohortTable, CriterionHit, PatientIndex, PatientKey,
};

use crate::activity::ActivitySummary;

/// One cohort's hit stream.
#[derive(Debug, Clone, Copy)]
pub struct LabeledHits<'a> {
    pub label: &'a CohortLabel,
    pub hits: &'a [CriterionHit],
}

struct Collapsed {
    date_criterion: NaiveDate,
    hit_count: usize,
}

fn collapse(hits: &[CriterionHit]) -> BTreeMap<&PatientKey, Collapsed> {
    let mut by_key: BTreeMap<&PatientKey, Collapsed> = BTreeMap::new();
    for hit in hits.iter().filter(|hit| hit.flag) {
        by_key
            .entry(&hit.key)
            .and_modify(|row| {
                row.date_criterion = row.date_criterion.min(hit.event_date);
                row.hit_count += 1;
            })
            .or_insert(Collapsed {
                date_criterion: hit.event_date,
                hit_count: 1,
            });
    }
    by_key
}

/// Build the unified cohort membership table.
///
/// Rows are ordered by stream, then key, then patient-index row order.
pub fn aggregate(
    streams: &[LabeledHits<'_>],
    patient_index: &PatientIndex,
    activities: &[ActivitySummary],
) -> CohortTable {
    let activity_names: Vec<String> = activities.iter().map(|a| a.name.clone()).collect();
    let mut rows = Vec::new();

    for stream in streams {
        for (key, collapsed) in collapse(stream.hits) {
            let activity: Vec<Option<u64>> = activities.iter().map(|a| a.get(key)).collect();
            let base = CohortMembershipRow {
                cohort_label: stream.label.clone(),
                key: key.clone(),
                date_criterion: collapsed.date_criterion,
                hit_count: collapsed.hit_count,
                age: None,
                gender: None,
                index_creation_date: None,
                in_patient_index: false,
                activity,
            };
            let matches = patient_index.lookup(key);
            if matches.is_empty() {
                rows.push(base);
                continue;
            }
            for record in matches {
                rows.push(CohortMembershipRow {
                    age: record.age,
                    gender: record.gender,
                    index_creation_date: record.index_creation_date,
                    in_patient_index: true,
                    ..base.clone()
                });
            }
        }
    }

    tracing::debug!(
        cohorts = streams.len(),
        rows = rows.len(),
        covariates = activity_names.len(),
        "cohort table aggregated"
    );
    CohortTable {
        activity_names,
        rows,
    }
}
