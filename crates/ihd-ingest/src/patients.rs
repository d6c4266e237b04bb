//! Patient index extraction.

use std::path::Path;

use ihd_model::{Gender, PatientIndex, PatientKey, PatientRecord};
use polars::prelude::*;

use crate::columns::string_column;
use crate::csv::read_csv_table;
use crate::error::{IngestError, Result};
use crate::values::{parse_age, parse_date};

/// Column names of the patient index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientIndexSchema {
    pub source_name: String,
    pub patient_id: String,
    pub index_date: String,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub index_creation_date: Option<String>,
}

impl Default for PatientIndexSchema {
    fn default() -> Self {
        Self {
            source_name: "patients".to_string(),
            patient_id: "patient_id".to_string(),
            index_date: "index_date".to_string(),
            age: Some("age".to_string()),
            gender: Some("gender".to_string()),
            index_creation_date: Some("index_creation_date".to_string()),
        }
    }
}

/// Result of extracting a patient index.
#[derive(Debug, Clone, Default)]
pub struct PatientIndexLoad {
    pub index: PatientIndex,
    /// Rows dropped for a blank patient id or unparseable index date.
    pub skipped_rows: usize,
    /// Configured optional columns absent from the table.
    pub missing_columns: Vec<String>,
}

fn optional_column(
    df: &DataFrame,
    name: Option<&str>,
    missing: &mut Vec<String>,
) -> Result<Option<StringChunked>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let values = string_column(df, name)?;
    if values.is_none() {
        missing.push(name.to_string());
    }
    Ok(values)
}

/// Build a patient index from a loaded table.
///
/// Every row with a usable key is kept, duplicates included. Optional
/// attributes that fail to parse are left empty.
pub fn patient_index_from_frame(
    df: &DataFrame,
    schema: &PatientIndexSchema,
) -> Result<PatientIndexLoad> {
    let require = |name: &str| -> Result<StringChunked> {
        string_column(df, name)?.ok_or_else(|| IngestError::MissingColumn {
            column: name.to_string(),
            source_name: schema.source_name.clone(),
        })
    };
    let ids = require(&schema.patient_id)?;
    let index_dates = require(&schema.index_date)?;

    let mut missing_columns = Vec::new();
    let ages = optional_column(df, schema.age.as_deref(), &mut missing_columns)?;
    let genders = optional_column(df, schema.gender.as_deref(), &mut missing_columns)?;
    let created = optional_column(
        df,
        schema.index_creation_date.as_deref(),
        &mut missing_columns,
    )?;
    for column in &missing_columns {
        tracing::warn!(
            source = %schema.source_name,
            column = %column,
            "patient index column not found"
        );
    }

    let mut records = Vec::with_capacity(df.height());
    let mut skipped_rows = 0usize;
    for idx in 0..df.height() {
        let key = match (ids.get(idx), index_dates.get(idx).and_then(parse_date)) {
            (Some(id), Some(date)) => PatientKey::new(id, date).ok(),
            _ => None,
        };
        let Some(key) = key else {
            skipped_rows += 1;
            continue;
        };
        let mut record = PatientRecord::new(key);
        record.age = ages.as_ref().and_then(|c| c.get(idx)).and_then(parse_age);
        record.gender = genders
            .as_ref()
            .and_then(|c| c.get(idx))
            .and_then(Gender::from_code);
        record.index_creation_date = created
            .as_ref()
            .and_then(|c| c.get(idx))
            .and_then(parse_date);
        records.push(record);
    }

    let index = PatientIndex::new(records);
    tracing::debug!(
        rows = index.len(),
        keys = index.key_count(),
        duplicate_rows = index.duplicate_row_count(),
        skipped_rows,
        "patient index built"
    );
    Ok(PatientIndexLoad {
        index,
        skipped_rows,
        missing_columns,
    })
}

/// Read and extract the patient index from a CSV file.
pub fn load_patient_index(path: &Path, schema: &PatientIndexSchema) -> Result<PatientIndexLoad> {
    let df = read_csv_table(path)?;
    patient_index_from_frame(&df, schema)
}
