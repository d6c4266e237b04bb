//! Data ingestion for IHD cohort selection.
//!
//! Source tables are static CSV snapshots in one data folder. Every table is
//! loaded into a Polars `DataFrame` with all columns as strings, so that
//! each evaluator applies its own value validation instead of relying on
//! schema inference.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use ihd_ingest::{discover_sources, load_sources};
//!
//! let discovered = discover_sources(Path::new("extract/2024-06"), &sources)?;
//! let (tables, failures) = load_sources(&discovered);
//! ```

mod columns;
mod csv;
mod discovery;
mod error;
mod patients;
mod tables;
mod values;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use csv::{read_csv_table, validate_encoding};

// === Source Discovery ===
pub use discovery::{DiscoveredSources, discover_sources, list_csv_files};

// === Tables ===
pub use columns::{ColumnLookup, string_column};
pub use tables::{SourceLoadFailure, SourceTables, load_sources};

// === Patient Index ===
pub use patients::{
    PatientIndexLoad, PatientIndexSchema, load_patient_index, patient_index_from_frame,
};

// === Values ===
pub use values::{parse_age, parse_date};
