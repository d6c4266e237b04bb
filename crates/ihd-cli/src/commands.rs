use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use tracing::{info, warn};

use ihd_criteria::definition::WindowDefinition;
use ihd_criteria::{AllowList, CriteriaSet, load_code_reference, load_criteria, resolve_criteria};
use ihd_cli::pipeline::run_pipeline;
use ihd_cli::types::{RunOptions, RunResult};

use crate::cli::{CheckCriteriaArgs, CriteriaArgs, RunArgs};
use crate::summary::{apply_table_style, dim_cell, header_cell};

fn load(path: Option<&Path>) -> Result<CriteriaSet> {
    let criteria = resolve_criteria(path).context("load criteria")?;
    info!(
        version = %criteria.version,
        fingerprint = %criteria.fingerprint,
        criteria = criteria.criterion_count(),
        "criteria resolved"
    );
    Ok(criteria)
}

/// Apply `--window-lower`/`--window-upper` on top of the configured window.
fn with_window_overrides(
    criteria: CriteriaSet,
    lower: Option<i64>,
    upper: Option<i64>,
) -> Result<CriteriaSet> {
    if lower.is_none() && upper.is_none() {
        return Ok(criteria);
    }
    let window = WindowDefinition {
        lower_exclusive: lower.unwrap_or(criteria.window.lower_exclusive),
        upper_exclusive: upper.unwrap_or(criteria.window.upper_exclusive),
    };
    criteria.with_window(window).context("window override")
}

pub fn run_cohort(args: &RunArgs) -> Result<RunResult> {
    let criteria = load(args.criteria.as_deref())?;
    let criteria = with_window_overrides(criteria, args.window_lower, args.window_upper)?;

    let mut options = RunOptions::new(&args.data_dir);
    if let Some(dir) = &args.output_dir {
        options.output_dir = dir.clone();
    }
    if let Some(dir) = &args.reference_dir {
        options.reference_dir = dir.clone();
    }
    options.parallel = !args.no_parallel;
    options.dry_run = args.dry_run;

    run_pipeline(&criteria, &options)
}

pub fn run_criteria(args: &CriteriaArgs) -> Result<()> {
    let criteria = load(args.criteria.as_deref())?;
    print_criteria(&criteria);
    Ok(())
}

/// Validate a criteria file and, with a reference folder, the allow-lists
/// its lookup criteria derive. Returns the number of warnings.
pub fn run_check_criteria(args: &CheckCriteriaArgs) -> Result<usize> {
    let criteria = load_criteria(&args.path)
        .with_context(|| format!("invalid criteria file {}", args.path.display()))?;
    println!(
        "{}: version {}, {} criteria, {} activities",
        args.path.display(),
        criteria.version,
        criteria.criterion_count(),
        criteria.activities.len()
    );
    println!("Fingerprint: {}", criteria.fingerprint);

    let Some(reference_dir) = &args.reference_dir else {
        return Ok(0);
    };
    let mut warnings = 0usize;
    for lookup in &criteria.lookups {
        let path = reference_dir.join(&lookup.reference_file);
        let reference = load_code_reference(
            &path,
            &lookup.reference_code_column,
            &lookup.reference_category_column,
        )
        .with_context(|| format!("criterion {}", lookup.label))?;
        let (allow_list, build_warnings) =
            AllowList::build(lookup.label.as_str(), &reference, &lookup.excluded_categories)
                .with_context(|| format!("criterion {}", lookup.label))?;
        println!(
            "{}: {} codes allowed, {} excluded",
            lookup.label,
            allow_list.len(),
            allow_list.excluded_len()
        );
        for warning in build_warnings {
            warn!(criterion = %lookup.label, "{warning}");
            println!("  warning: {warning}");
            warnings += 1;
        }
    }
    Ok(warnings)
}

fn print_criteria(criteria: &CriteriaSet) {
    println!("Criteria version: {}", criteria.version);
    if let Some(description) = &criteria.description {
        println!("{description}");
    }
    println!(
        "Window: ({}, {}) days from the index date, bounds exclusive",
        criteria.window.lower_exclusive, criteria.window.upper_exclusive
    );

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Label"),
        header_cell("Kind"),
        header_cell("Source"),
        header_cell("Date column"),
        header_cell("Definition"),
    ]);
    apply_table_style(&mut table);
    for criterion in &criteria.patterns {
        let rules: Vec<String> = criterion
            .rules
            .iter()
            .map(|rule| {
                let patterns: Vec<&str> =
                    rule.patterns.iter().map(|p| p.pattern.as_str()).collect();
                format!("{} ~ {}", rule.field, patterns.join(" | "))
            })
            .collect();
        table.add_row(vec![
            Cell::new(&criterion.label),
            Cell::new("pattern"),
            Cell::new(&criterion.source),
            Cell::new(&criterion.date_column),
            Cell::new(rules.join("\n")),
        ]);
    }
    for criterion in &criteria.thresholds {
        let unit = criterion.unit.as_deref().unwrap_or_default();
        table.add_row(vec![
            Cell::new(&criterion.label),
            Cell::new("threshold"),
            Cell::new(&criterion.source),
            Cell::new(&criterion.date_column),
            Cell::new(format!(
                "{} ~ {}; {} {} {} {unit} ({})",
                criterion.test_name_column,
                criterion.test_pattern.pattern,
                criterion.value_column,
                criterion.comparison.symbol(),
                criterion.cutoff,
                criterion.format
            )),
        ]);
    }
    for criterion in &criteria.lookups {
        let excluded = if criterion.excluded_categories.is_empty() {
            "-".to_string()
        } else {
            criterion.excluded_categories.join(", ")
        };
        table.add_row(vec![
            Cell::new(&criterion.label),
            Cell::new("lookup"),
            Cell::new(&criterion.source),
            Cell::new(&criterion.date_column),
            Cell::new(format!(
                "{} in {}; excluding {excluded}",
                criterion.code_column, criterion.reference_file
            )),
        ]);
    }
    println!("{table}");

    if criteria.activities.is_empty() {
        return;
    }
    let mut activities = Table::new();
    activities.set_header(vec![
        header_cell("Activity"),
        header_cell("Source"),
        header_cell("Date column"),
        header_cell("Counts"),
    ]);
    apply_table_style(&mut activities);
    for activity in &criteria.activities {
        let counts = match &activity.distinct_column {
            Some(column) => Cell::new(format!("distinct {column}")),
            None => dim_cell("rows"),
        };
        activities.add_row(vec![
            Cell::new(&activity.name),
            Cell::new(&activity.source),
            Cell::new(&activity.date_column),
            counts,
        ]);
    }
    println!("{activities}");
}
