use ihd_criteria::CriteriaError;
use ihd_ingest::IngestError;
use thiserror::Error;

/// Failure of a single evaluator or activity summary.
///
/// These never abort a run on their own; the caller decides whether enough
/// evaluators succeeded.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{label}: required column '{column}' not found in {source_name}")]
    MissingColumn {
        label: String,
        source_name: String,
        column: String,
    },

    #[error("{label}: {source}")]
    Criteria {
        label: String,
        #[source]
        source: CriteriaError,
    },

    #[error("{label}: {source}")]
    Ingest {
        label: String,
        #[source]
        source: IngestError,
    },
}

impl EvaluationError {
    pub fn label(&self) -> &str {
        match self {
            Self::MissingColumn { label, .. }
            | Self::Criteria { label, .. }
            | Self::Ingest { label, .. } => label,
        }
    }

    pub(crate) fn ingest(label: &str, source: IngestError) -> Self {
        Self::Ingest {
            label: label.to_string(),
            source,
        }
    }
}
