use std::path::Path;

use chrono::NaiveDate;
use ihd_core::{
    EvaluatorConfig, EvaluatorSet, OverlapMatrix, aggregate, cohort_statistics,
    summarize_activities,
};
use ihd_criteria::parse_criteria;
use ihd_ingest::SourceTables;
use ihd_model::{CohortLabel, PatientIndex, PatientKey, PatientRecord};
use polars::prelude::*;

const CRITERIA: &str = r#"
[criteria]
schema = "ihd-cohort.criteria"
schema_version = 1
version = "engine-test"

[sources]
patients = "patients.csv"
diagnoses = "diagnoses.csv"
lab_results = "lab_results.csv"
procedures = "procedures.csv"

[patient_index]
source = "patients"

[[pattern]]
label = "diagnosis"
source = "diagnoses"
date_column = "diagnosis_date"

[[pattern.rules]]
field = "description"
patterns = ["myocardinfarct"]

[[threshold]]
label = "troponin"
source = "lab_results"
date_column = "result_date"
test_name_column = "test_name"
value_column = "result_value"
test_pattern = "trop"
cutoff = 45.0
format = "integer"

[[lookup]]
label = "procedure"
source = "procedures"
date_column = "procedure_date"
code_column = "procedure_code"
reference_file = "procedure_codes.csv"
excluded_categories = ["cardioversie"]

[[activity]]
name = "lab_result_count"
source = "lab_results"
date_column = "result_date"

[[activity]]
name = "procedure_count"
source = "procedures"
date_column = "procedure_date"
distinct_column = "procedure_code"
"#;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn frame(columns: &[(&str, Vec<&str>)]) -> DataFrame {
    DataFrame::new(
        columns
            .iter()
            .map(|(name, values)| Series::new((*name).into(), values.clone()).into_column())
            .collect(),
    )
    .unwrap()
}

fn tables() -> SourceTables {
    SourceTables::new()
        .with_table(
            "diagnoses",
            frame(&[
                ("patient_id", vec!["P1"]),
                ("index_date", vec!["2020-01-01"]),
                ("diagnosis_date", vec!["2020-03-01"]),
                ("description", vec!["Acuut myocardinfarct"]),
            ]),
        )
        .with_table(
            "lab_results",
            frame(&[
                ("patient_id", vec!["P1"]),
                ("index_date", vec!["2020-01-01"]),
                ("result_date", vec!["2021-06-01"]),
                ("test_name", vec!["Trop"]),
                ("result_value", vec!["120"]),
            ]),
        )
        .with_table(
            "procedures",
            frame(&[
                ("patient_id", vec!["P1"]),
                ("index_date", vec!["2020-01-01"]),
                ("procedure_date", vec!["2020-01-15"]),
                ("procedure_code", vec!["339900"]),
            ]),
        )
}

fn reference_dir() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("procedure_codes.csv"),
        "code,category\n335010,PCI\n339900,cardioversie\n",
    )
    .unwrap();
    dir
}

#[test]
fn end_to_end_scenario() {
    let criteria = parse_criteria(CRITERIA, Path::new("engine.toml")).unwrap();
    let dir = reference_dir();
    let (evaluators, build_failures) = EvaluatorSet::build(&criteria, dir.path());
    assert!(build_failures.is_empty());
    assert_eq!(evaluators.len(), 3);

    let key = PatientKey::new("P1", date(2020, 1, 1)).unwrap();
    let index = PatientIndex::new(vec![PatientRecord::new(key.clone())]);
    let tables = tables();

    let (evaluations, failures) = evaluators.run(&tables, &index, true);
    assert!(failures.is_empty());
    assert_eq!(evaluations.len(), 3);

    let hits_for = |label: &str| {
        evaluations
            .iter()
            .find(|e| e.label.as_str() == label)
            .map(|e| e.hits.clone())
            .unwrap()
    };
    let diagnosis = hits_for("diagnosis");
    assert_eq!(diagnosis.len(), 1);
    assert_eq!(diagnosis[0].key, key);
    assert_eq!(diagnosis[0].event_date, date(2020, 3, 1));
    assert!(hits_for("troponin").is_empty());
    assert!(hits_for("procedure").is_empty());

    let config = EvaluatorConfig::from_criteria(&criteria);
    let (activities, errors) = summarize_activities(&criteria.activities, &tables, &index, &config);
    assert!(errors.is_empty());

    let streams: Vec<_> = evaluations.iter().map(|e| e.labeled()).collect();
    let table = aggregate(&streams, &index, &activities);
    assert_eq!(table.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.cohort_label, CohortLabel::new("diagnosis").unwrap());
    assert_eq!(row.date_criterion, date(2020, 3, 1));
    // the only lab row is outside the window
    assert_eq!(row.activity, vec![None, Some(1)]);

    let stats = cohort_statistics(&table);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].covariates[0].missing, 1);
    assert_eq!(OverlapMatrix::from_table(&table).union, 1);
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let criteria = parse_criteria(CRITERIA, Path::new("engine.toml")).unwrap();
    let dir = reference_dir();
    let (evaluators, _) = EvaluatorSet::build(&criteria, dir.path());
    let index = PatientIndex::new(vec![PatientRecord::new(
        PatientKey::new("P1", date(2020, 1, 1)).unwrap(),
    )]);
    let tables = tables();

    let (parallel, _) = evaluators.run(&tables, &index, true);
    let (sequential, _) = evaluators.run(&tables, &index, false);
    let summarize = |evaluations: &[ihd_core::Evaluation]| {
        evaluations
            .iter()
            .map(|e| (e.label.clone(), e.hits.clone(), e.stats))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&parallel), summarize(&sequential));
}

#[test]
fn missing_reference_file_disables_only_the_lookup() {
    let criteria = parse_criteria(CRITERIA, Path::new("engine.toml")).unwrap();
    let empty = tempfile::TempDir::new().unwrap();
    let (evaluators, failures) = EvaluatorSet::build(&criteria, empty.path());
    assert_eq!(evaluators.len(), 2);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].label, "procedure");

    let index = PatientIndex::new(vec![PatientRecord::new(
        PatientKey::new("P1", date(2020, 1, 1)).unwrap(),
    )]);
    let (evaluations, run_failures) = evaluators.run(&tables(), &index, false);
    assert_eq!(evaluations.len(), 2);
    assert!(run_failures.is_empty());
}
