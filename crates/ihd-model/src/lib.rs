//! Domain model for IHD cohort selection.
//!
//! Patients are identified for matching purposes by the pair
//! (`patient_id`, `index_date`), see [`PatientKey`]. Evaluators emit
//! [`CriterionHit`]s which the aggregator turns into
//! [`CohortMembershipRow`]s.

pub mod cohort;
pub mod error;
pub mod hit;
pub mod patient;

pub use cohort::{
    ActivityCount, CohortMembershipRow, CohortTable, LABEL_COLUMN, MEMBERSHIP_COLUMNS,
};
pub use error::{ModelError, Result};
pub use hit::{CohortLabel, CriterionHit};
pub use patient::{Gender, PatientIndex, PatientKey, PatientRecord};
