#![deny(unsafe_code)]

//! Raw TOML shape of a criteria file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CRITERIA_SCHEMA: &str = "ihd-cohort.criteria";
pub const CRITERIA_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaFile {
    pub criteria: CriteriaHeader,
    #[serde(default)]
    pub window: WindowDefinition,
    #[serde(default)]
    pub columns: KeyColumns,
    /// Source table name to file name, relative to the data directory.
    pub sources: BTreeMap<String, String>,
    pub patient_index: PatientIndexDefinition,
    #[serde(default)]
    pub pattern: Vec<PatternDefinition>,
    #[serde(default)]
    pub threshold: Vec<ThresholdDefinition>,
    #[serde(default)]
    pub lookup: Vec<LookupDefinition>,
    #[serde(default)]
    pub activity: Vec<ActivityDefinitionRaw>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaHeader {
    pub schema: String,
    pub schema_version: u32,
    /// Identifies this criteria definition in run manifests.
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowDefinition {
    pub lower_exclusive: i64,
    pub upper_exclusive: i64,
}

impl Default for WindowDefinition {
    fn default() -> Self {
        Self {
            lower_exclusive: -1,
            upper_exclusive: 365,
        }
    }
}

/// Key column names shared by every event table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyColumns {
    pub patient_id: String,
    pub index_date: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            patient_id: "patient_id".to_string(),
            index_date: "index_date".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientIndexDefinition {
    pub source: String,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub index_creation_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub label: String,
    pub source: String,
    pub date_column: String,
    pub rules: Vec<FieldRuleDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRuleDefinition {
    pub field: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDefinition {
    pub label: String,
    pub source: String,
    pub date_column: String,
    pub test_name_column: String,
    pub value_column: String,
    pub test_pattern: String,
    pub cutoff: f64,
    #[serde(default = "default_comparison")]
    pub comparison: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub unit: Option<String>,
}

fn default_comparison() -> String {
    ">".to_string()
}

fn default_format() -> String {
    "decimal".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupDefinition {
    pub label: String,
    pub source: String,
    pub date_column: String,
    pub code_column: String,
    /// Reference list file, relative to the data directory.
    pub reference_file: String,
    #[serde(default = "default_reference_code")]
    pub reference_code_column: String,
    #[serde(default = "default_reference_category")]
    pub reference_category_column: String,
    #[serde(default)]
    pub excluded_categories: Vec<String>,
}

fn default_reference_code() -> String {
    "code".to_string()
}

fn default_reference_category() -> String {
    "category".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDefinitionRaw {
    pub name: String,
    pub source: String,
    pub date_column: String,
    /// Count distinct values of this column; count rows when absent.
    #[serde(default)]
    pub distinct_column: Option<String>,
}
