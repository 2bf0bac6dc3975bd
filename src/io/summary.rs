//! Read/write the run summary JSON.
//!
//! The summary is the machine-readable companion of the text report:
//! - which datasets were loaded, promoted and excluded
//! - the reference granularity and common window used for alignment
//! - loadings, noise variance and fit diagnostics
//!
//! The schema is defined by `domain::RunSummary`.

use std::fs::File;
use std::path::Path;

use crate::align::AlignmentReport;
use crate::domain::{PromotedIndex, RunSummary};
use crate::error::AppError;
use crate::factor::FactorRun;

/// Collect the summary of a finished run.
pub fn build_run_summary(run: &FactorRun, alignment: &AlignmentReport) -> RunSummary {
    let result = &run.result;

    let mut datasets: Vec<String> = alignment
        .normalize
        .promoted
        .iter()
        .map(|p| p.dataset.clone())
        .chain(alignment.normalize.unindexed.iter().cloned())
        .collect();
    datasets.sort();

    let promoted = alignment
        .normalize
        .promoted
        .iter()
        .map(|p| PromotedIndex {
            dataset: p.dataset.clone(),
            column: p.column.clone(),
            format: p.format.pattern().to_string(),
            dropped_rows: p.dropped_rows,
        })
        .collect();

    let loadings = result
        .loadings
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect();

    RunSummary {
        tool: "tsfa".to_string(),
        datasets,
        promoted,
        excluded: alignment.excluded.clone(),
        reference_dataset: alignment.reference.as_ref().map(|r| r.dataset.clone()),
        reference_granularity_secs: alignment.reference.as_ref().map(|r| r.granularity_secs),
        window_start: alignment.window.map(|w| w.start),
        window_end: alignment.window.map(|w| w.end),
        n_rows: result.index.len(),
        columns: result.columns.clone(),
        factor_names: result.factor_names.clone(),
        loadings,
        noise_variance: result.noise_variance.iter().copied().collect(),
        diagnostics: result.diagnostics,
    }
}

/// Write a run summary JSON file.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::input(format!("Failed to write summary JSON: {e}")))
}

/// Read a run summary JSON file.
pub fn read_run_summary(path: &Path) -> Result<RunSummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid summary JSON: {e}")))
}
