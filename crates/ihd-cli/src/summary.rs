use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use ihd_cli::types::RunResult;
use ihd_core::CohortStatistics;

pub fn print_summary(result: &RunResult) {
    println!("Criteria: {}", result.criteria_version);
    println!(
        "Window: ({}, {}) days",
        result.window.lower_exclusive, result.window.upper_exclusive
    );
    println!(
        "Patient index: {} rows ({} skipped)",
        result.patient_index_rows, result.patient_index_skipped_rows
    );
    if result.warnings > 0 {
        println!("Warnings: {}", result.warnings);
    }
    match &result.manifest {
        Some(path) => println!("Output: {} ({})", result.output_dir.display(), path.display()),
        None => println!("Output: none (dry run)"),
    }

    print_criteria_table(result);
    print_cohort_table(result);

    if !result.missing_sources.is_empty() {
        println!();
        println!("Missing sources:");
        for (source, file) in &result.missing_sources {
            println!("- {source}: {file}");
        }
    }
    if !result.failures.is_empty() {
        eprintln!("Failed criteria:");
        for failure in &result.failures {
            eprintln!("- {} ({}): {}", failure.label, failure.source, failure.message);
        }
    }
    if !result.errors.is_empty() {
        eprintln!("Notes:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

fn print_criteria_table(result: &RunResult) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Criterion"),
        header_cell("Kind"),
        header_cell("Source"),
        header_cell("Rows"),
        header_cell("Matched"),
        header_cell("Malformed"),
        header_cell("In window"),
        header_cell("Hits"),
        header_cell("Patients"),
        header_cell("Warnings"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..10 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_hits = 0usize;
    for evaluation in &result.evaluations {
        let stats = &evaluation.stats;
        total_hits += stats.hits;
        table.add_row(vec![
            label_cell(evaluation.label.as_str()),
            Cell::new(evaluation.kind.as_str()),
            Cell::new(&evaluation.source),
            Cell::new(stats.rows_scanned),
            Cell::new(stats.rows_matched),
            count_cell(Some(stats.rows_malformed), Color::Yellow),
            Cell::new(stats.rows_in_window),
            Cell::new(stats.hits),
            Cell::new(stats.unique_patients),
            count_cell(Some(evaluation.warnings.len()), Color::Yellow),
        ]);
    }
    for failure in &result.failures {
        table.add_row(vec![
            label_cell(&failure.label),
            Cell::new("failed").fg(Color::Red).add_attribute(Attribute::Bold),
            Cell::new(&failure.source),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        Cell::new(total_hits).add_attribute(Attribute::Bold),
        Cell::new(result.overlap.union).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");
}

fn print_cohort_table(result: &RunResult) {
    if result.statistics.is_empty() {
        println!("No cohort members.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Cohort"),
        header_cell("Patients"),
        header_cell("Pairs"),
        header_cell("Rows"),
        header_cell("No index row"),
        header_cell("Mean age"),
        header_cell("Median age"),
        header_cell("Genders"),
    ]);
    apply_table_style(&mut table);
    for index in 1..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for stats in &result.statistics {
        table.add_row(vec![
            label_cell(stats.label.as_str()),
            Cell::new(stats.patients),
            Cell::new(stats.keys),
            Cell::new(stats.rows),
            count_cell(Some(stats.keys_without_index_row), Color::Yellow),
            age_cell(stats.mean_age),
            age_cell(stats.median_age),
            Cell::new(genders(stats)),
        ]);
    }
    println!("{table}");
    println!(
        "Any IHD definition: {} (patient, index date) pairs; membership table: {} rows",
        result.overlap.union, result.membership_rows
    );
}

fn genders(stats: &CohortStatistics) -> String {
    stats
        .genders
        .iter()
        .map(|(gender, count)| format!("{gender}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn age_cell(value: Option<f64>) -> Cell {
    match value {
        Some(age) => Cell::new(format!("{age:.1}")),
        None => dim_cell("-"),
    }
}

fn count_cell(count: Option<usize>, color: Color) -> Cell {
    match count {
        Some(value) if value > 0 => Cell::new(value).fg(color).add_attribute(Attribute::Bold),
        Some(value) => dim_cell(value),
        None => dim_cell("-"),
    }
}

fn label_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(150);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
