use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cohort label must not be empty")]
    EmptyLabel,
    #[error("invalid cohort label '{0}': only letters, digits, '_' and '-' are allowed")]
    InvalidLabel(String),
    #[error("patient id must not be empty")]
    EmptyPatientId,
}

pub type Result<T> = std::result::Result<T, ModelError>;
