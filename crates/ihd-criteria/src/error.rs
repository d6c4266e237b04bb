#![deny(unsafe_code)]

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse criteria file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid criteria definition: {message}")]
    InvalidDefinition { message: String },

    #[error("unsupported criteria schema {schema} v{version}")]
    UnsupportedSchema { schema: String, version: u32 },

    #[error("invalid pattern '{pattern}' in criterion {label}: {source}")]
    InvalidPattern {
        label: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid cohort label: {0}")]
    InvalidLabel(#[from] ihd_model::ModelError),

    #[error("duplicate criterion label: {label}")]
    DuplicateLabel { label: String },

    #[error("criterion {label} references unknown source table '{source_name}'")]
    UnknownSource { label: String, source_name: String },

    #[error("invalid window: lower bound {lower} must be below upper bound {upper}")]
    InvalidWindow { lower: i64, upper: i64 },

    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error(
        "criterion {label}: codes listed under both excluded and included categories: {codes}"
    )]
    ConflictingCategories { label: String, codes: String },
}

impl CriteriaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }
}
