use std::io::Write;
use std::path::Path;

use ihd_criteria::{
    Comparison, CriteriaError, NumericFormat, load_code_reference, load_criteria,
    load_default_criteria, parse_criteria,
};

const MINIMAL: &str = r#"
[criteria]
schema = "ihd-cohort.criteria"
schema_version = 1
version = "test-1"

[sources]
patients = "patients.csv"
diagnoses = "diagnoses.csv"

[patient_index]
source = "patients"

[[pattern]]
label = "diagnosis"
source = "diagnoses"
date_column = "diagnosis_date"

[[pattern.rules]]
field = "description"
patterns = ["myocardinfarct"]
"#;

#[test]
fn loads_bundled_criteria() {
    let set = load_default_criteria().expect("load bundled criteria");
    assert_eq!(set.version, "nl-2024.1");
    assert_eq!(set.window.lower_exclusive, -1);
    assert_eq!(set.window.upper_exclusive, 365);
    let labels: Vec<&str> = set.labels().iter().map(|l| l.as_str()).collect();
    assert_eq!(
        labels,
        vec!["diagnosis", "dbc", "discharge_letter", "troponin", "ckmb", "procedure"]
    );
    assert_eq!(set.activities.len(), 6);
    assert_eq!(set.fingerprint.len(), 64);
}

#[test]
fn bundled_thresholds_match_published_cutoffs() {
    let set = load_default_criteria().expect("load bundled criteria");
    let troponin = &set.thresholds[0];
    assert_eq!(troponin.cutoff, 45.0);
    assert_eq!(troponin.comparison, Comparison::GreaterThan);
    assert_eq!(troponin.format, NumericFormat::Integer);
    assert!(troponin.test_pattern.is_match("Trop"));
    let ckmb = &set.thresholds[1];
    assert_eq!(ckmb.cutoff, 8.0);
    assert_eq!(ckmb.format, NumericFormat::Decimal);
    assert!(ckmb.test_pattern.is_match("CK-MB massa"));
}

#[test]
fn bundled_procedure_exclusions() {
    let set = load_default_criteria().expect("load bundled criteria");
    let lookup = &set.lookups[0];
    assert!(lookup.excluded_categories.contains(&"cardioversie".to_string()));
}

#[test]
fn minimal_criteria_uses_default_window_and_columns() {
    let set = parse_criteria(MINIMAL, Path::new("minimal.toml")).expect("parse minimal");
    assert_eq!(set.window.upper_exclusive, 365);
    assert_eq!(set.key_columns.patient_id, "patient_id");
    assert!(set.activities.is_empty());
}

#[test]
fn rejects_unknown_source() {
    let text = MINIMAL.replace("source = \"diagnoses\"", "source = \"letters\"");
    let err = parse_criteria(&text, Path::new("bad.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::UnknownSource { .. }));
}

#[test]
fn rejects_duplicate_labels() {
    let text = format!(
        "{MINIMAL}\n[[pattern]]\nlabel = \"diagnosis\"\nsource = \"diagnoses\"\ndate_column = \"d\"\n[[pattern.rules]]\nfield = \"x\"\npatterns = [\"y\"]\n"
    );
    let err = parse_criteria(&text, Path::new("dup.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::DuplicateLabel { .. }));
}

#[test]
fn rejects_labels_differing_only_in_case() {
    let text = format!(
        "{MINIMAL}\n[[pattern]]\nlabel = \"Diagnosis\"\nsource = \"diagnoses\"\ndate_column = \"d\"\n[[pattern.rules]]\nfield = \"x\"\npatterns = [\"y\"]\n"
    );
    let err = parse_criteria(&text, Path::new("case.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::DuplicateLabel { ref label } if label == "Diagnosis"));
}

#[test]
fn rejects_label_named_like_the_label_column() {
    let text = MINIMAL.replace("label = \"diagnosis\"", "label = \"cohort_label\"");
    let err = parse_criteria(&text, Path::new("label.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::InvalidDefinition { .. }));
}

#[test]
fn rejects_activity_named_like_a_membership_column() {
    for name in ["age", "Hit_Count", "cohort_label"] {
        let text = format!(
            "{MINIMAL}\n[[activity]]\nname = \"{name}\"\nsource = \"diagnoses\"\ndate_column = \"diagnosis_date\"\n"
        );
        let err = parse_criteria(&text, Path::new("activity.toml")).unwrap_err();
        assert!(
            matches!(err, CriteriaError::InvalidDefinition { ref message } if message.contains(name)),
            "{name}: {err}"
        );
    }
}

#[test]
fn accepts_activity_with_a_distinct_name() {
    let text = format!(
        "{MINIMAL}\n[[activity]]\nname = \"diagnosis_count\"\nsource = \"diagnoses\"\ndate_column = \"diagnosis_date\"\n"
    );
    let set = parse_criteria(&text, Path::new("activity.toml")).unwrap();
    assert_eq!(set.activities.len(), 1);
}

#[test]
fn rejects_empty_window() {
    let text = format!("{MINIMAL}\n[window]\nlower_exclusive = 10\nupper_exclusive = 10\n");
    let err = parse_criteria(&text, Path::new("window.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::InvalidWindow { .. }));
}

#[test]
fn rejects_unsupported_schema_version() {
    let text = MINIMAL.replace("schema_version = 1", "schema_version = 2");
    let err = parse_criteria(&text, Path::new("v2.toml")).unwrap_err();
    assert!(matches!(err, CriteriaError::UnsupportedSchema { version: 2, .. }));
}

#[test]
fn window_override_is_validated() {
    let set = parse_criteria(MINIMAL, Path::new("minimal.toml")).unwrap();
    let mut window = set.window;
    window.upper_exclusive = 31;
    let narrowed = set.clone().with_window(window).unwrap();
    assert_eq!(narrowed.window.upper_exclusive, 31);
    window.lower_exclusive = 40;
    assert!(set.with_window(window).is_err());
}

#[test]
fn loads_criteria_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{MINIMAL}").unwrap();
    let set = load_criteria(file.path()).expect("load from file");
    assert_eq!(set.version, "test-1");
}

#[test]
fn loads_reference_csv_with_bom_and_blank_codes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "\u{feff}Code,Category\n33510,PCI\n,CABG\n33990,cardioversie\n"
    )
    .unwrap();
    let reference = load_code_reference(file.path(), "code", "category").expect("load reference");
    assert_eq!(reference.entries.len(), 2);
    assert_eq!(reference.entries[1].category, "cardioversie");
}

#[test]
fn reference_missing_column_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "code\n33510\n").unwrap();
    let err = load_code_reference(file.path(), "code", "category").unwrap_err();
    assert!(matches!(err, CriteriaError::Csv { .. }));
}
