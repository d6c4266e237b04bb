//! Library components of the `ihd-cohort` command-line tool.

pub mod logging;
pub mod pipeline;
pub mod types;
