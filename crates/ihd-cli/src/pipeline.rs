//! Cohort selection pipeline with explicit stages.
//!
//! 1. **Ingest**: resolve source files, load tables, build the patient index
//! 2. **Evaluate**: run every criterion evaluator
//! 3. **Aggregate**: activity summaries, membership table, statistics
//! 4. **Output**: CSV tables and the run manifest
//!
//! Only a missing or unusable patient index stops the run. Missing source
//! files, unreadable tables and failing criteria are collected and reported.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span, trace, warn};

use ihd_core::{
    ActivitySummary, CohortStatistics, Evaluation, EvaluationError, EvaluatorConfig,
    EvaluatorFailure, EvaluatorSet, LabeledHits, OverlapMatrix, aggregate, cohort_statistics,
    summarize_activities,
};
use ihd_criteria::CriteriaSet;
use ihd_ingest::{
    DiscoveredSources, PatientIndexLoad, PatientIndexSchema, SourceLoadFailure, SourceTables,
    discover_sources, load_sources, patient_index_from_frame,
};
use ihd_model::CohortTable;
use ihd_report::{
    EvaluationRecord, FailureRecord, OutputFiles, RunManifest, write_outputs, write_run_manifest,
};

use crate::logging::redact_value;
use crate::types::{CriterionFailure, RunOptions, RunResult};

// ============================================================================
// Stage 1: Ingest
// ============================================================================

#[derive(Debug)]
pub struct IngestResult {
    pub discovered: DiscoveredSources,
    pub tables: SourceTables,
    pub load_failures: Vec<SourceLoadFailure>,
    pub patient_index: PatientIndexLoad,
}

/// Patient index column names as configured in the criteria.
pub fn patient_index_schema(criteria: &CriteriaSet) -> PatientIndexSchema {
    let columns = &criteria.patient_index;
    PatientIndexSchema {
        source_name: columns.source.clone(),
        patient_id: columns.patient_id.clone(),
        index_date: columns.index_date.clone(),
        age: columns.age.clone(),
        gender: columns.gender.clone(),
        index_creation_date: columns.index_creation_date.clone(),
    }
}

/// Resolve and load every configured source, then build the patient index.
///
/// # Errors
///
/// Fails when the data folder cannot be listed or the patient index table
/// is missing, unreadable, or lacks a key column.
pub fn ingest(data_dir: &Path, criteria: &CriteriaSet) -> Result<IngestResult> {
    let discovered = discover_sources(data_dir, &criteria.sources)
        .with_context(|| format!("discover sources in {}", data_dir.display()))?;
    let (tables, load_failures) = load_sources(&discovered);

    let schema = patient_index_schema(criteria);
    let frame = tables
        .require(&schema.source_name)
        .context("patient index unavailable")?;
    let patient_index =
        patient_index_from_frame(frame, &schema).context("build patient index")?;
    if patient_index.skipped_rows > 0 {
        warn!(
            skipped = patient_index.skipped_rows,
            "patient index rows without a usable key"
        );
    }
    for column in &patient_index.missing_columns {
        warn!(column = %column, "patient index column not found");
    }
    if patient_index.index.is_empty() {
        warn!("patient index is empty");
    }

    Ok(IngestResult {
        discovered,
        tables,
        load_failures,
        patient_index,
    })
}

// ============================================================================
// Stage 2: Evaluate
// ============================================================================

#[derive(Debug, Default)]
pub struct EvaluateResult {
    pub evaluations: Vec<Evaluation>,
    /// Criteria that could not be built or failed while running.
    pub failures: Vec<EvaluatorFailure>,
}

pub fn evaluate(
    criteria: &CriteriaSet,
    ingest: &IngestResult,
    reference_dir: &Path,
    parallel: bool,
) -> EvaluateResult {
    let (evaluators, mut failures) = EvaluatorSet::build(criteria, reference_dir);
    let (evaluations, run_failures) =
        evaluators.run(&ingest.tables, &ingest.patient_index.index, parallel);
    failures.extend(run_failures);
    EvaluateResult {
        evaluations,
        failures,
    }
}

// ============================================================================
// Stage 3: Aggregate
// ============================================================================

#[derive(Debug)]
pub struct AggregateResult {
    pub table: CohortTable,
    pub activities: Vec<ActivitySummary>,
    pub activity_errors: Vec<EvaluationError>,
    pub statistics: Vec<CohortStatistics>,
    pub overlap: OverlapMatrix,
}

pub fn aggregate_cohorts(
    criteria: &CriteriaSet,
    ingest: &IngestResult,
    evaluations: &[Evaluation],
) -> AggregateResult {
    let index = &ingest.patient_index.index;
    let config = EvaluatorConfig::from_criteria(criteria);
    let (activities, activity_errors) =
        summarize_activities(&criteria.activities, &ingest.tables, index, &config);

    let streams: Vec<LabeledHits<'_>> = evaluations.iter().map(Evaluation::labeled).collect();
    let table = aggregate(&streams, index, &activities);
    for row in table.rows.iter().filter(|row| !row.in_patient_index) {
        trace!(
            cohort = %row.cohort_label,
            patient_id = redact_value(&row.key.patient_id),
            index_date = %row.key.index_date,
            "hit without patient index row"
        );
    }

    let statistics = cohort_statistics(&table);
    let overlap = OverlapMatrix::from_table(&table);
    AggregateResult {
        table,
        activities,
        activity_errors,
        statistics,
        overlap,
    }
}

// ============================================================================
// Stage 4: Output
// ============================================================================

/// Problems outside individual criteria, one line each.
pub fn collect_notes(ingest: &IngestResult, aggregated: &AggregateResult) -> Vec<String> {
    let mut notes = Vec::new();
    for (source, file) in &ingest.discovered.missing {
        notes.push(format!("source {source}: {file} not found"));
    }
    for failure in &ingest.load_failures {
        notes.push(format!("source {}: {}", failure.source_name, failure.error));
    }
    if ingest.patient_index.skipped_rows > 0 {
        notes.push(format!(
            "patient index: {} rows skipped without a usable key",
            ingest.patient_index.skipped_rows
        ));
    }
    for error in &aggregated.activity_errors {
        notes.push(format!("activity {}: {error}", error.label()));
    }
    for summary in aggregated.activities.iter().filter(|a| !a.available) {
        if aggregated
            .activity_errors
            .iter()
            .all(|error| error.label() != summary.name)
        {
            notes.push(format!("activity {}: source unavailable", summary.name));
        }
    }
    notes
}

pub fn build_manifest(
    criteria: &CriteriaSet,
    ingest: &IngestResult,
    evaluated: &EvaluateResult,
    aggregated: &AggregateResult,
    notes: Vec<String>,
) -> RunManifest {
    let mut manifest = RunManifest::new(criteria);
    let row_counts = ingest.tables.row_counts();
    for source in criteria.sources.keys() {
        manifest.add_input(
            source,
            ingest.discovered.path(source),
            row_counts.get(source).copied(),
        );
    }
    manifest.patient_index_rows = ingest.patient_index.index.len();
    manifest.patient_index_skipped_rows = ingest.patient_index.skipped_rows;
    manifest.evaluations = evaluated
        .evaluations
        .iter()
        .map(EvaluationRecord::from)
        .collect();
    manifest.failures = evaluated.failures.iter().map(FailureRecord::from).collect();
    manifest.cohorts = aggregated.statistics.clone();
    manifest.union = aggregated.overlap.union;
    manifest.notes = notes;
    manifest
}

/// Write the CSV tables, then the manifest listing them.
pub fn output(
    dir: &Path,
    manifest: &mut RunManifest,
    evaluations: &[Evaluation],
    aggregated: &AggregateResult,
) -> Result<(OutputFiles, PathBuf)> {
    let files = write_outputs(
        dir,
        evaluations,
        &aggregated.table,
        &aggregated.statistics,
        &aggregated.overlap,
    )
    .with_context(|| format!("write outputs to {}", dir.display()))?;
    for path in files.all() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            manifest.outputs.insert(name.to_string(), path.to_path_buf());
        }
    }
    let manifest_path = write_run_manifest(dir, manifest).context("write run manifest")?;
    Ok((files, manifest_path))
}

// ============================================================================
// Full run
// ============================================================================

/// Run every stage for one data folder.
pub fn run_pipeline(criteria: &CriteriaSet, options: &RunOptions) -> Result<RunResult> {
    let run_span = info_span!(
        "run",
        criteria_version = %criteria.version,
        data_dir = %options.data_dir.display()
    );
    let _run_guard = run_span.enter();

    let ingest_start = Instant::now();
    let ingested = info_span!("ingest").in_scope(|| ingest(&options.data_dir, criteria))?;
    info!(
        sources = ingested.tables.len(),
        missing = ingested.discovered.missing.len(),
        failed = ingested.load_failures.len(),
        patient_index_rows = ingested.patient_index.index.len(),
        duration_ms = ingest_start.elapsed().as_millis(),
        "ingest complete"
    );

    let evaluate_start = Instant::now();
    let evaluated = info_span!("evaluate").in_scope(|| {
        evaluate(criteria, &ingested, &options.reference_dir, options.parallel)
    });
    info!(
        evaluated = evaluated.evaluations.len(),
        failed = evaluated.failures.len(),
        parallel = options.parallel,
        duration_ms = evaluate_start.elapsed().as_millis(),
        "evaluate complete"
    );

    let aggregate_start = Instant::now();
    let aggregated = info_span!("aggregate")
        .in_scope(|| aggregate_cohorts(criteria, &ingested, &evaluated.evaluations));
    info!(
        rows = aggregated.table.len(),
        cohorts = aggregated.statistics.len(),
        union = aggregated.overlap.union,
        duration_ms = aggregate_start.elapsed().as_millis(),
        "aggregate complete"
    );

    let notes = collect_notes(&ingested, &aggregated);
    let mut manifest = build_manifest(criteria, &ingested, &evaluated, &aggregated, notes);

    let (outputs, manifest_path) = if options.dry_run {
        info!("dry run, no files written");
        (None, None)
    } else {
        let output_start = Instant::now();
        let (files, manifest_path) = info_span!("output", dir = %options.output_dir.display())
            .in_scope(|| {
                output(
                    &options.output_dir,
                    &mut manifest,
                    &evaluated.evaluations,
                    &aggregated,
                )
            })?;
        info!(
            files = files.all().len() + 1,
            duration_ms = output_start.elapsed().as_millis(),
            "output complete"
        );
        (Some(files), Some(manifest_path))
    };

    let failures = evaluated
        .failures
        .iter()
        .map(|failure| CriterionFailure {
            label: failure.label.clone(),
            source: failure.source.clone(),
            message: failure.error.to_string(),
        })
        .collect();
    let has_errors = evaluated.evaluations.is_empty();
    Ok(RunResult {
        criteria_version: criteria.version.clone(),
        window: criteria.window.into(),
        output_dir: options.output_dir.clone(),
        patient_index_rows: ingested.patient_index.index.len(),
        patient_index_skipped_rows: ingested.patient_index.skipped_rows,
        membership_rows: aggregated.table.len(),
        warnings: manifest.warning_count(),
        missing_sources: ingested.discovered.missing.clone(),
        errors: manifest.notes.clone(),
        evaluations: evaluated.evaluations,
        failures,
        statistics: aggregated.statistics,
        overlap: aggregated.overlap,
        outputs,
        manifest: manifest_path,
        has_errors,
    })
}
