#![deny(unsafe_code)]

//! Criteria definitions for IHD cohort selection.
//!
//! A criteria file is a versioned TOML document naming the source tables,
//! the temporal window, and one entry per criterion. It is parsed into
//! [`definition::CriteriaFile`] and compiled into a [`CriteriaSet`] with
//! regular expressions built and labels validated. Nothing here is global:
//! the compiled set is passed to each evaluator at construction time.

pub mod compiled;
pub mod definition;
pub mod error;
pub mod hash;
pub mod loaders;
pub mod reference;
pub mod warning;

pub use crate::compiled::{
    ActivityDefinition, CompiledPattern, Comparison, CriteriaSet, FieldRule, LookupCriterion,
    NumericFormat, PatientIndexColumns, PatternCriterion, ThresholdCriterion,
};
pub use crate::error::CriteriaError;
pub use crate::loaders::{
    CRITERIA_ENV_VAR, DEFAULT_CRITERIA_TOML, load_criteria, load_default_criteria,
    parse_criteria, resolve_criteria,
};
pub use crate::reference::{AllowList, CodeReference, ReferenceEntry, load_code_reference};
pub use crate::warning::CriteriaWarning;
