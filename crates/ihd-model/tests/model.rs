//! Tests for ihd-model types.

use chrono::NaiveDate;
use ihd_model::{CohortLabel, CohortMembershipRow, CohortTable, CriterionHit, PatientKey};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn row(label: &str, patient: &str) -> CohortMembershipRow {
    CohortMembershipRow {
        cohort_label: CohortLabel::new(label).unwrap(),
        key: PatientKey::new(patient, date(2020, 1, 1)).unwrap(),
        date_criterion: date(2020, 3, 1),
        hit_count: 1,
        age: Some(64),
        gender: None,
        index_creation_date: None,
        in_patient_index: true,
        activity: vec![Some(2), None],
    }
}

#[test]
fn hits_order_by_key_then_date() {
    let key_a = PatientKey::new("A", date(2020, 1, 1)).unwrap();
    let key_b = PatientKey::new("B", date(2019, 1, 1)).unwrap();
    let mut hits = vec![
        CriterionHit::new(key_b.clone(), date(2019, 2, 1)),
        CriterionHit::new(key_a.clone(), date(2020, 5, 1)),
        CriterionHit::new(key_a.clone(), date(2020, 2, 1)),
    ];
    hits.sort();
    assert_eq!(hits[0].key, key_a);
    assert_eq!(hits[0].event_date, date(2020, 2, 1));
    assert_eq!(hits[2].key, key_b);
}

#[test]
fn cohort_table_labels_keep_first_seen_order() {
    let table = CohortTable {
        activity_names: vec!["lab_result_count".into(), "procedure_count".into()],
        rows: vec![row("troponin", "P1"), row("diagnosis", "P1"), row("troponin", "P2")],
    };
    let labels: Vec<String> = table.labels().iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["troponin", "diagnosis"]);
    let troponin = CohortLabel::new("troponin").unwrap();
    assert_eq!(table.rows_for(&troponin).count(), 2);
    assert_eq!(table.activity_position("procedure_count"), Some(1));
}

#[test]
fn membership_row_serializes() {
    let json = serde_json::to_string(&row("ckmb", "P9")).expect("serialize row");
    assert!(json.contains("\"cohort_label\":\"ckmb\""));
    let round: CohortMembershipRow = serde_json::from_str(&json).expect("deserialize row");
    assert_eq!(round.key.patient_id, "P9");
    assert_eq!(round.activity, vec![Some(2), None]);
}

#[test]
fn invalid_label_is_rejected_on_deserialize() {
    let result: Result<CohortLabel, _> = serde_json::from_str("\"bad label\"");
    assert!(result.is_err());
}
