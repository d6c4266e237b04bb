//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ihd-cohort",
    version,
    about = "Select Ischemic Heart Disease cohorts from EHR extracts",
    long_about = "Select Ischemic Heart Disease cohorts from static EHR CSV extracts.\n\n\
                  Each criterion (diagnosis codes, DBC codes, discharge letters, troponin,\n\
                  CK-MB, coronary procedures) is evaluated independently inside a temporal\n\
                  window around every patient's index date, and the results are merged\n\
                  into one cohort membership table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow patient identifiers in trace-level logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate all criteria against a data folder and write the cohort tables.
    Run(RunArgs),

    /// Show the effective criteria definition.
    Criteria(CriteriaArgs),

    /// Load and validate a criteria file.
    CheckCriteria(CheckCriteriaArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Folder with the CSV extract.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Criteria file (default: $IHD_CRITERIA_PATH, then the bundled set).
    #[arg(long = "criteria", value_name = "PATH")]
    pub criteria: Option<PathBuf>,

    /// Output directory (default: <DATA_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Folder holding lookup reference lists (default: DATA_DIR).
    #[arg(long = "reference-dir", value_name = "DIR")]
    pub reference_dir: Option<PathBuf>,

    /// Exclusive lower window bound in days relative to the index date.
    #[arg(long = "window-lower", value_name = "DAYS", allow_negative_numbers = true)]
    pub window_lower: Option<i64>,

    /// Exclusive upper window bound in days relative to the index date.
    #[arg(long = "window-upper", value_name = "DAYS", allow_negative_numbers = true)]
    pub window_upper: Option<i64>,

    /// Evaluate criteria one after another instead of in parallel.
    #[arg(long = "no-parallel")]
    pub no_parallel: bool,

    /// Evaluate and report without writing output files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct CriteriaArgs {
    /// Criteria file (default: $IHD_CRITERIA_PATH, then the bundled set).
    #[arg(long = "criteria", value_name = "PATH")]
    pub criteria: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CheckCriteriaArgs {
    /// Criteria file to validate.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Also load lookup reference lists from this folder.
    #[arg(long = "reference-dir", value_name = "DIR")]
    pub reference_dir: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
