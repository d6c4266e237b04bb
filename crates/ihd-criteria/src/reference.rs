#![deny(unsafe_code)]

//! Procedure code reference lists and the allow-lists derived from them.
//!
//! An allow-list is built in two stages: categories listed as excluded are
//! removed from the reference list, and the remaining codes form the set a
//! source row must belong to. A code that occurs under both an excluded and
//! a retained category would make the result depend on stage order, so it
//! is rejected as [`CriteriaError::ConflictingCategories`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::CriteriaError;
use crate::warning::CriteriaWarning;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub code: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeReference {
    pub entries: Vec<ReferenceEntry>,
}

impl CodeReference {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// Distinct categories, case-folded.
    pub fn categories(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|e| normalize_category(&e.category))
            .collect()
    }
}

/// Normalized form used for code comparisons.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Load a reference list with one code and one category column.
///
/// Rows with a blank code are skipped.
pub fn load_code_reference(
    path: &Path,
    code_column: &str,
    category_column: &str,
) -> Result<CodeReference, CriteriaError> {
    let bytes = std::fs::read(path).map_err(|e| CriteriaError::io(path, e))?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| CriteriaError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .clone();

    let position = |name: &str| -> Result<usize, CriteriaError> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| CriteriaError::Csv {
                path: path.to_path_buf(),
                message: format!("missing column {name}"),
            })
    };
    let code_idx = position(code_column)?;
    let category_idx = position(category_column)?;

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| CriteriaError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let code = row.get(code_idx).map(str::trim).unwrap_or_default();
        if code.is_empty() {
            continue;
        }
        let category = row.get(category_idx).map(str::trim).unwrap_or_default();
        entries.push(ReferenceEntry {
            code: code.to_string(),
            category: category.to_string(),
        });
    }
    Ok(CodeReference { entries })
}

/// Codes eligible for a lookup criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    codes: BTreeSet<String>,
    excluded_codes: BTreeSet<String>,
}

impl AllowList {
    /// Apply category exclusions to a reference list.
    ///
    /// Unknown excluded categories and an empty result are returned as
    /// warnings.
    pub fn build(
        label: &str,
        reference: &CodeReference,
        excluded_categories: &[String],
    ) -> Result<(Self, Vec<CriteriaWarning>), CriteriaError> {
        let mut warnings = Vec::new();
        let excluded: BTreeSet<String> = excluded_categories
            .iter()
            .map(|c| normalize_category(c))
            .collect();
        let known = reference.categories();
        for category in &excluded {
            if !known.contains(category) {
                warnings.push(CriteriaWarning::UnknownExclusionCategory {
                    label: label.to_string(),
                    category: category.clone(),
                });
            }
        }

        let mut retained_by_code: BTreeMap<String, bool> = BTreeMap::new();
        let mut excluded_codes = BTreeSet::new();
        for entry in &reference.entries {
            let code = normalize_code(&entry.code);
            if excluded.contains(&normalize_category(&entry.category)) {
                excluded_codes.insert(code.clone());
                retained_by_code.entry(code).or_insert(false);
            } else {
                retained_by_code.insert(code, true);
            }
        }

        let conflicts: Vec<&String> = excluded_codes
            .iter()
            .filter(|code| retained_by_code.get(*code).copied().unwrap_or(false))
            .collect();
        if !conflicts.is_empty() {
            let mut listed: Vec<String> = conflicts.iter().take(10).map(|c| (*c).clone()).collect();
            if conflicts.len() > listed.len() {
                listed.push(format!("... ({} total)", conflicts.len()));
            }
            return Err(CriteriaError::ConflictingCategories {
                label: label.to_string(),
                codes: listed.join(", "),
            });
        }

        let codes: BTreeSet<String> = retained_by_code
            .into_iter()
            .filter_map(|(code, retained)| retained.then_some(code))
            .collect();
        if codes.is_empty() {
            warnings.push(CriteriaWarning::EmptyAllowList {
                label: label.to_string(),
            });
        }
        Ok((
            Self {
                codes,
                excluded_codes,
            },
            warnings,
        ))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&normalize_code(code))
    }

    /// Whether a code was removed by a category exclusion.
    pub fn is_excluded(&self, code: &str) -> bool {
        self.excluded_codes.contains(&normalize_code(code))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn excluded_len(&self) -> usize {
        self.excluded_codes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, category: &str) -> ReferenceEntry {
        ReferenceEntry {
            code: code.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn excluded_category_codes_are_not_allowed() {
        let reference = CodeReference::new(vec![
            entry("33510", "PCI"),
            entry("33520", "CABG"),
            entry("33990", "Cardioversie"),
        ]);
        let (allow, warnings) =
            AllowList::build("procedure", &reference, &["cardioversie".to_string()]).unwrap();
        assert!(warnings.is_empty());
        assert!(allow.contains("33510"));
        assert!(allow.contains(" 33520 "));
        assert!(!allow.contains("33990"));
        assert!(allow.is_excluded("33990"));
        assert_eq!(allow.len(), 2);
    }

    #[test]
    fn conflicting_categories_are_rejected() {
        let reference = CodeReference::new(vec![
            entry("33510", "PCI"),
            entry("33510", "cardioversie"),
        ]);
        let err =
            AllowList::build("procedure", &reference, &["cardioversie".to_string()]).unwrap_err();
        assert!(matches!(err, CriteriaError::ConflictingCategories { .. }));
        assert!(err.to_string().contains("33510"));
    }

    #[test]
    fn unknown_category_is_a_warning() {
        let reference = CodeReference::new(vec![entry("33510", "PCI")]);
        let (allow, warnings) =
            AllowList::build("procedure", &reference, &["transplantatie".to_string()]).unwrap();
        assert_eq!(allow.len(), 1);
        assert_eq!(
            warnings,
            vec![CriteriaWarning::UnknownExclusionCategory {
                label: "procedure".to_string(),
                category: "transplantatie".to_string(),
            }]
        );
    }

    #[test]
    fn duplicate_code_in_same_retained_category_is_fine() {
        let reference = CodeReference::new(vec![entry("33510", "PCI"), entry("33510", "pci")]);
        let (allow, _) = AllowList::build("procedure", &reference, &[]).unwrap();
        assert_eq!(allow.len(), 1);
    }
}
