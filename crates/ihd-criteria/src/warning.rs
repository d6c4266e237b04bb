//! Non-fatal criteria problems.
//!
//! Warnings are raised at the evaluator boundary and travel with the
//! evaluator's output so the run can report them without stopping.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriteriaWarning {
    /// An excluded category does not occur in the reference list.
    UnknownExclusionCategory { label: String, category: String },
    /// A configured pattern matched no row of its source table.
    PatternMatchedNothing {
        label: String,
        field: String,
        pattern: String,
    },
    /// A configured column is absent from the source table.
    MissingColumn {
        label: String,
        source_name: String,
        column: String,
    },
    /// The source table was not provided or has no rows.
    EmptySource { label: String, source_name: String },
    /// The allow-list is empty after applying exclusions.
    EmptyAllowList { label: String },
    /// The criterion produced no hits at all.
    NoHits { label: String },
}

impl CriteriaWarning {
    pub fn label(&self) -> &str {
        match self {
            Self::UnknownExclusionCategory { label, .. }
            | Self::PatternMatchedNothing { label, .. }
            | Self::MissingColumn { label, .. }
            | Self::EmptySource { label, .. }
            | Self::EmptyAllowList { label }
            | Self::NoHits { label } => label,
        }
    }
}

impl fmt::Display for CriteriaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownExclusionCategory { label, category } => write!(
                f,
                "{label}: excluded category '{category}' does not occur in the reference list"
            ),
            Self::PatternMatchedNothing {
                label,
                field,
                pattern,
            } => write!(f, "{label}: pattern '{pattern}' on {field} matched no rows"),
            Self::MissingColumn {
                label,
                source_name,
                column,
            } => write!(f, "{label}: column '{column}' not found in {source_name}"),
            Self::EmptySource { label, source_name } => {
                write!(f, "{label}: source table {source_name} is missing or empty")
            }
            Self::EmptyAllowList { label } => {
                write!(f, "{label}: allow-list is empty after exclusions")
            }
            Self::NoHits { label } => write!(f, "{label}: no hits"),
        }
    }
}
