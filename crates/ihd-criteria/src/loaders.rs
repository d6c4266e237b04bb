#![deny(unsafe_code)]

//! Criteria file resolution and loading.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compiled::CriteriaSet;
use crate::definition::CriteriaFile;
use crate::error::CriteriaError;
use crate::hash::sha256_hex;

/// Environment variable naming a criteria file to use instead of the
/// bundled default.
pub const CRITERIA_ENV_VAR: &str = "IHD_CRITERIA_PATH";

/// Bundled Dutch-language IHD criteria.
pub const DEFAULT_CRITERIA_TOML: &str = include_str!("../criteria/ihd_nl.toml");

/// Parse and compile criteria from TOML text.
///
/// `origin` is only used in error messages.
pub fn parse_criteria(text: &str, origin: &Path) -> Result<CriteriaSet, CriteriaError> {
    let file: CriteriaFile = toml::from_str(text).map_err(|e| CriteriaError::Toml {
        path: origin.to_path_buf(),
        source: e,
    })?;
    CriteriaSet::compile(file, sha256_hex(text.as_bytes()))
}

pub fn load_criteria(path: &Path) -> Result<CriteriaSet, CriteriaError> {
    let contents = std::fs::read_to_string(path).map_err(|e| CriteriaError::io(path, e))?;
    let set = parse_criteria(&contents, path)?;
    debug!(
        path = %path.display(),
        version = %set.version,
        criteria = set.criterion_count(),
        "criteria loaded"
    );
    Ok(set)
}

pub fn load_default_criteria() -> Result<CriteriaSet, CriteriaError> {
    parse_criteria(DEFAULT_CRITERIA_TOML, Path::new("<bundled>/ihd_nl.toml"))
}

/// Resolve the criteria to use.
///
/// Resolution order:
/// 1. explicit path
/// 2. `IHD_CRITERIA_PATH` environment variable
/// 3. bundled default
pub fn resolve_criteria(explicit: Option<&Path>) -> Result<CriteriaSet, CriteriaError> {
    if let Some(path) = explicit {
        return load_criteria(path);
    }
    if let Ok(path) = std::env::var(CRITERIA_ENV_VAR) {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return load_criteria(&path);
        }
    }
    load_default_criteria()
}
