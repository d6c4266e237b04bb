#![deny(unsafe_code)]

//! Validated, ready-to-evaluate criteria.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ihd_model::{CohortLabel, LABEL_COLUMN, MEMBERSHIP_COLUMNS};
use regex::{Regex, RegexBuilder};

use crate::definition::{
    ActivityDefinitionRaw, CRITERIA_SCHEMA, CRITERIA_SCHEMA_VERSION, CriteriaFile, KeyColumns,
    LookupDefinition, PatternDefinition, ThresholdDefinition, WindowDefinition,
};
use crate::error::CriteriaError;

/// A case-insensitive, unanchored pattern with its source text kept for
/// reporting.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub pattern: String,
    pub regex: Regex,
}

impl CompiledPattern {
    pub fn new(label: &str, pattern: &str) -> Result<Self, CriteriaError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CriteriaError::InvalidPattern {
                label: label.to_string(),
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Patterns evaluated against one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: String,
    pub patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
pub struct PatternCriterion {
    pub label: CohortLabel,
    pub source: String,
    pub date_column: String,
    pub rules: Vec<FieldRule>,
}

/// Comparison applied between a lab value and its cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    pub fn holds(self, value: f64, cutoff: f64) -> bool {
        match self {
            Self::GreaterThan => value > cutoff,
            Self::GreaterOrEqual => value >= cutoff,
            Self::LessThan => value < cutoff,
            Self::LessOrEqual => value <= cutoff,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

impl FromStr for Comparison {
    type Err = CriteriaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            ">" | "gt" => Ok(Self::GreaterThan),
            ">=" | "ge" => Ok(Self::GreaterOrEqual),
            "<" | "lt" => Ok(Self::LessThan),
            "<=" | "le" => Ok(Self::LessOrEqual),
            other => Err(CriteriaError::invalid(format!(
                "unknown comparison '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Accepted textual format of a lab result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFormat {
    /// Digits only.
    Integer,
    /// Digits with an optional `.` fraction.
    Decimal,
}

impl FromStr for NumericFormat {
    type Err = CriteriaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "decimal" | "float" => Ok(Self::Decimal),
            other => Err(CriteriaError::invalid(format!(
                "unknown numeric format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for NumericFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Decimal => f.write_str("decimal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdCriterion {
    pub label: CohortLabel,
    pub source: String,
    pub date_column: String,
    pub test_name_column: String,
    pub value_column: String,
    pub test_pattern: CompiledPattern,
    pub cutoff: f64,
    pub comparison: Comparison,
    pub format: NumericFormat,
    pub unit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LookupCriterion {
    pub label: CohortLabel,
    pub source: String,
    pub date_column: String,
    pub code_column: String,
    pub reference_file: String,
    pub reference_code_column: String,
    pub reference_category_column: String,
    pub excluded_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDefinition {
    pub name: String,
    pub source: String,
    pub date_column: String,
    pub distinct_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientIndexColumns {
    pub source: String,
    pub patient_id: String,
    pub index_date: String,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub index_creation_date: Option<String>,
}

/// A compiled criteria definition.
#[derive(Debug, Clone)]
pub struct CriteriaSet {
    pub version: String,
    pub description: Option<String>,
    pub window: WindowDefinition,
    pub key_columns: KeyColumns,
    pub sources: BTreeMap<String, String>,
    pub patient_index: PatientIndexColumns,
    pub patterns: Vec<PatternCriterion>,
    pub thresholds: Vec<ThresholdCriterion>,
    pub lookups: Vec<LookupCriterion>,
    pub activities: Vec<ActivityDefinition>,
    /// sha256 of the criteria text this set was compiled from.
    pub fingerprint: String,
}

impl CriteriaSet {
    pub fn compile(file: CriteriaFile, fingerprint: String) -> Result<Self, CriteriaError> {
        if file.criteria.schema != CRITERIA_SCHEMA
            || file.criteria.schema_version != CRITERIA_SCHEMA_VERSION
        {
            return Err(CriteriaError::UnsupportedSchema {
                schema: file.criteria.schema,
                version: file.criteria.schema_version,
            });
        }
        if file.window.lower_exclusive >= file.window.upper_exclusive {
            return Err(CriteriaError::InvalidWindow {
                lower: file.window.lower_exclusive,
                upper: file.window.upper_exclusive,
            });
        }
        if file.criteria.version.trim().is_empty() {
            return Err(CriteriaError::invalid("criteria version must not be empty"));
        }

        let sources = file.sources;
        let mut seen_labels = BTreeSet::new();

        let patient_index = PatientIndexColumns {
            source: require_source(&sources, "patient_index", &file.patient_index.source)?,
            patient_id: file.columns.patient_id.clone(),
            index_date: file.columns.index_date.clone(),
            age: file.patient_index.age,
            gender: file.patient_index.gender,
            index_creation_date: file.patient_index.index_creation_date,
        };

        let patterns = file
            .pattern
            .into_iter()
            .map(|def| compile_pattern(def, &sources, &mut seen_labels))
            .collect::<Result<Vec<_>, _>>()?;
        let thresholds = file
            .threshold
            .into_iter()
            .map(|def| compile_threshold(def, &sources, &mut seen_labels))
            .collect::<Result<Vec<_>, _>>()?;
        let lookups = file
            .lookup
            .into_iter()
            .map(|def| compile_lookup(def, &sources, &mut seen_labels))
            .collect::<Result<Vec<_>, _>>()?;

        let mut activity_names = BTreeSet::new();
        let mut activities = Vec::with_capacity(file.activity.len());
        for ActivityDefinitionRaw {
            name,
            source,
            date_column,
            distinct_column,
        } in file.activity
        {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CriteriaError::invalid("activity name must not be empty"));
            }
            if MEMBERSHIP_COLUMNS
                .iter()
                .any(|column| column.eq_ignore_ascii_case(&name))
            {
                return Err(CriteriaError::invalid(format!(
                    "activity name {name} clashes with a membership table column"
                )));
            }
            if !activity_names.insert(name.to_ascii_lowercase()) {
                return Err(CriteriaError::invalid(format!(
                    "duplicate activity name: {name}"
                )));
            }
            let source = require_source(&sources, &name, &source)?;
            activities.push(ActivityDefinition {
                name,
                source,
                date_column,
                distinct_column,
            });
        }

        if patterns.is_empty() && thresholds.is_empty() && lookups.is_empty() {
            return Err(CriteriaError::invalid("no criteria defined"));
        }

        Ok(Self {
            version: file.criteria.version,
            description: file.criteria.description,
            window: file.window,
            key_columns: file.columns,
            sources,
            patient_index,
            patterns,
            thresholds,
            lookups,
            activities,
            fingerprint,
        })
    }

    /// All criterion labels in definition order (patterns, thresholds, lookups).
    pub fn labels(&self) -> Vec<&CohortLabel> {
        self.patterns
            .iter()
            .map(|c| &c.label)
            .chain(self.thresholds.iter().map(|c| &c.label))
            .chain(self.lookups.iter().map(|c| &c.label))
            .collect()
    }

    pub fn criterion_count(&self) -> usize {
        self.patterns.len() + self.thresholds.len() + self.lookups.len()
    }

    pub fn activity_names(&self) -> Vec<String> {
        self.activities.iter().map(|a| a.name.clone()).collect()
    }

    /// File name configured for a source table.
    pub fn source_file(&self, source: &str) -> Option<&str> {
        self.sources.get(source).map(String::as_str)
    }

    /// Override the temporal window, e.g. from command-line flags.
    pub fn with_window(mut self, window: WindowDefinition) -> Result<Self, CriteriaError> {
        if window.lower_exclusive >= window.upper_exclusive {
            return Err(CriteriaError::InvalidWindow {
                lower: window.lower_exclusive,
                upper: window.upper_exclusive,
            });
        }
        self.window = window;
        Ok(self)
    }
}

fn require_source(
    sources: &BTreeMap<String, String>,
    label: &str,
    source: &str,
) -> Result<String, CriteriaError> {
    if sources.contains_key(source) {
        Ok(source.to_string())
    } else {
        Err(CriteriaError::UnknownSource {
            label: label.to_string(),
            source_name: source.to_string(),
        })
    }
}

fn claim_label(raw: &str, seen: &mut BTreeSet<String>) -> Result<CohortLabel, CriteriaError> {
    let label = CohortLabel::new(raw)?;
    if label.as_str().eq_ignore_ascii_case(LABEL_COLUMN) {
        return Err(CriteriaError::invalid(format!(
            "label {label} clashes with the {LABEL_COLUMN} column"
        )));
    }
    // Labels name output files, which may live on a case-insensitive filesystem.
    if !seen.insert(label.as_str().to_ascii_lowercase()) {
        return Err(CriteriaError::DuplicateLabel {
            label: label.to_string(),
        });
    }
    Ok(label)
}

fn compile_pattern(
    def: PatternDefinition,
    sources: &BTreeMap<String, String>,
    seen: &mut BTreeSet<String>,
) -> Result<PatternCriterion, CriteriaError> {
    let label = claim_label(&def.label, seen)?;
    let source = require_source(sources, label.as_str(), &def.source)?;
    if def.rules.is_empty() {
        return Err(CriteriaError::invalid(format!("{label}: no rules defined")));
    }
    let mut rules = Vec::with_capacity(def.rules.len());
    for rule in def.rules {
        if rule.patterns.is_empty() {
            return Err(CriteriaError::invalid(format!(
                "{label}: rule on {} has no patterns",
                rule.field
            )));
        }
        let patterns = rule
            .patterns
            .iter()
            .map(|p| CompiledPattern::new(label.as_str(), p))
            .collect::<Result<Vec<_>, _>>()?;
        rules.push(FieldRule {
            field: rule.field,
            patterns,
        });
    }
    Ok(PatternCriterion {
        label,
        source,
        date_column: def.date_column,
        rules,
    })
}

fn compile_threshold(
    def: ThresholdDefinition,
    sources: &BTreeMap<String, String>,
    seen: &mut BTreeSet<String>,
) -> Result<ThresholdCriterion, CriteriaError> {
    let label = claim_label(&def.label, seen)?;
    let source = require_source(sources, label.as_str(), &def.source)?;
    if !def.cutoff.is_finite() {
        return Err(CriteriaError::invalid(format!(
            "{label}: cutoff must be a finite number"
        )));
    }
    let test_pattern = CompiledPattern::new(label.as_str(), &def.test_pattern)?;
    Ok(ThresholdCriterion {
        comparison: def.comparison.parse()?,
        format: def.format.parse()?,
        label,
        source,
        date_column: def.date_column,
        test_name_column: def.test_name_column,
        value_column: def.value_column,
        test_pattern,
        cutoff: def.cutoff,
        unit: def.unit,
    })
}

fn compile_lookup(
    def: LookupDefinition,
    sources: &BTreeMap<String, String>,
    seen: &mut BTreeSet<String>,
) -> Result<LookupCriterion, CriteriaError> {
    let label = claim_label(&def.label, seen)?;
    let source = require_source(sources, label.as_str(), &def.source)?;
    Ok(LookupCriterion {
        label,
        source,
        date_column: def.date_column,
        code_column: def.code_column,
        reference_file: def.reference_file,
        reference_code_column: def.reference_code_column,
        reference_category_column: def.reference_category_column,
        excluded_categories: def
            .excluded_categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_is_strict_for_greater_than() {
        assert!(!Comparison::GreaterThan.holds(45.0, 45.0));
        assert!(Comparison::GreaterThan.holds(45.000_001, 45.0));
        assert!(Comparison::GreaterOrEqual.holds(45.0, 45.0));
    }

    #[test]
    fn comparison_parses_symbols() {
        assert_eq!(">".parse::<Comparison>().unwrap(), Comparison::GreaterThan);
        assert_eq!("<=".parse::<Comparison>().unwrap(), Comparison::LessOrEqual);
        assert!("=>".parse::<Comparison>().is_err());
    }

    #[test]
    fn patterns_are_case_insensitive_and_unanchored() {
        let pattern = CompiledPattern::new("diagnosis", "myocardinfarct").unwrap();
        assert!(pattern.is_match("Acuut MYOCARDINFARCT anterior"));
        assert!(!pattern.is_match("myocarditis"));
    }

    #[test]
    fn invalid_regex_reports_label() {
        let err = CompiledPattern::new("dbc", "(unclosed").unwrap_err();
        assert!(err.to_string().contains("dbc"));
    }
}
