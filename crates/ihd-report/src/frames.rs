//! Conversion of engine output into Polars frames.
//!
//! Dates are written as ISO-8601 strings. Missing values stay null and
//! are rendered as empty cells.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use ihd_core::{CohortStatistics, OverlapMatrix};
use ihd_model::{CohortTable, CriterionHit};
use polars::prelude::*;

use crate::error::Result;

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Per-criterion hit table: `patient_id, index_date, date_criterion, flag`.
pub fn hits_frame(hits: &[CriterionHit]) -> Result<DataFrame> {
    let patient_ids: Vec<&str> = hits.iter().map(|h| h.key.patient_id.as_str()).collect();
    let index_dates: Vec<String> = hits.iter().map(|h| iso(h.key.index_date)).collect();
    let event_dates: Vec<String> = hits.iter().map(|h| iso(h.event_date)).collect();
    let flags: Vec<i32> = hits.iter().map(|h| i32::from(h.flag)).collect();
    let df = DataFrame::new(vec![
        Series::new("patient_id".into(), patient_ids).into_column(),
        Series::new("index_date".into(), index_dates).into_column(),
        Series::new("date_criterion".into(), event_dates).into_column(),
        Series::new("flag".into(), flags).into_column(),
    ])?;
    Ok(df)
}

/// The unified cohort membership table with one column per activity
/// covariate.
pub fn membership_frame(table: &CohortTable) -> Result<DataFrame> {
    let rows = &table.rows;
    let mut columns = vec![
        Series::new(
            "cohort_label".into(),
            rows.iter()
                .map(|r| r.cohort_label.as_str())
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "patient_id".into(),
            rows.iter()
                .map(|r| r.key.patient_id.as_str())
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "index_date".into(),
            rows.iter()
                .map(|r| iso(r.key.index_date))
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "date_criterion".into(),
            rows.iter()
                .map(|r| iso(r.date_criterion))
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "hit_count".into(),
            rows.iter().map(|r| r.hit_count as u64).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "age".into(),
            rows.iter().map(|r| r.age).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "gender".into(),
            rows.iter()
                .map(|r| r.gender.map(|g| g.as_str()))
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "index_creation_date".into(),
            rows.iter()
                .map(|r| r.index_creation_date.map(iso))
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "in_patient_index".into(),
            rows.iter().map(|r| r.in_patient_index).collect::<Vec<_>>(),
        )
        .into_column(),
    ];
    for (pos, name) in table.activity_names.iter().enumerate() {
        let values: Vec<Option<u64>> = rows
            .iter()
            .map(|r| r.activity.get(pos).copied().flatten())
            .collect();
        columns.push(Series::new(name.as_str().into(), values).into_column());
    }
    Ok(DataFrame::new(columns)?)
}

/// One row per cohort with counts, age, gender distribution and the
/// median of every covariate.
pub fn statistics_frame(stats: &[CohortStatistics]) -> Result<DataFrame> {
    let count = |f: &dyn Fn(&CohortStatistics) -> usize| -> Vec<u64> {
        stats.iter().map(|s| f(s) as u64).collect()
    };
    let mut columns = vec![
        Series::new(
            "cohort_label".into(),
            stats.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new("patients".into(), count(&|s| s.patients)).into_column(),
        Series::new("patient_index_pairs".into(), count(&|s| s.keys)).into_column(),
        Series::new("hits".into(), count(&|s| s.hits)).into_column(),
        Series::new("rows".into(), count(&|s| s.rows)).into_column(),
        Series::new(
            "pairs_without_index_row".into(),
            count(&|s| s.keys_without_index_row),
        )
        .into_column(),
        Series::new(
            "mean_age".into(),
            stats.iter().map(|s| s.mean_age).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "median_age".into(),
            stats.iter().map(|s| s.median_age).collect::<Vec<_>>(),
        )
        .into_column(),
    ];

    let genders: BTreeSet<&str> = stats
        .iter()
        .flat_map(|s| s.genders.keys().map(String::as_str))
        .collect();
    for gender in genders {
        let values: Vec<u64> = stats
            .iter()
            .map(|s| s.genders.get(gender).copied().unwrap_or(0) as u64)
            .collect();
        columns.push(Series::new(format!("gender_{gender}").into(), values).into_column());
    }

    if let Some(first) = stats.first() {
        for (pos, covariate) in first.covariates.iter().enumerate() {
            let medians: Vec<Option<f64>> = stats
                .iter()
                .map(|s| s.covariates.get(pos).and_then(|c| c.median))
                .collect();
            let missing: Vec<u64> = stats
                .iter()
                .map(|s| s.covariates.get(pos).map_or(0, |c| c.missing as u64))
                .collect();
            columns.push(
                Series::new(format!("median_{}", covariate.name).into(), medians).into_column(),
            );
            columns.push(
                Series::new(format!("missing_{}", covariate.name).into(), missing).into_column(),
            );
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Square overlap matrix with a leading `cohort_label` column.
pub fn overlap_frame(overlap: &OverlapMatrix) -> Result<DataFrame> {
    let mut columns = vec![
        Series::new(
            "cohort_label".into(),
            overlap
                .labels
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>(),
        )
        .into_column(),
    ];
    for (j, label) in overlap.labels.iter().enumerate() {
        let values: Vec<u64> = overlap.counts.iter().map(|row| row[j] as u64).collect();
        columns.push(Series::new(label.as_str().into(), values).into_column());
    }
    Ok(DataFrame::new(columns)?)
}
