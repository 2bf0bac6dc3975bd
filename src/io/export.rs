//! Persist run outputs to an output directory.
//!
//! Files written after a successful fit:
//! - `input_fa_data.csv`: merged, cleaned input table (no index column)
//! - `factor_loadings_and_variance.txt`: human-readable loadings + noise variance
//! - `factors.csv`: factor scores, one row per timestamp (no index column)
//! - `run_summary.json`: optional machine-readable summary (see `io::summary`)
//!
//! Nothing is written when the pipeline fails.

use std::fs::{create_dir_all, remove_dir, remove_file};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::align::AlignmentReport;
use crate::domain::{ColumnData, Dataset, FactorAnalysisResult, Timestamp};
use crate::error::AppError;
use crate::factor::FactorRun;
use crate::io::summary::{build_run_summary, write_summary_json};

pub const INPUT_FILE: &str = "input_fa_data.csv";
pub const REPORT_FILE: &str = "factor_loadings_and_variance.txt";
pub const FACTORS_FILE: &str = "factors.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Paths of the files written for a run.
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub input: PathBuf,
    pub report: PathBuf,
    pub factors: PathBuf,
    pub summary: Option<PathBuf>,
}

/// Write every run artifact into `dir` (created if needed).
///
/// All or nothing: if any file fails to write, the files already written are
/// removed again, as is `dir` when this call created it.
pub fn write_run_outputs(
    dir: &Path,
    run: &FactorRun,
    alignment: &AlignmentReport,
    with_summary: bool,
) -> Result<WrittenOutputs, AppError> {
    let created_dir = !dir.exists();
    create_dir_all(dir)
        .map_err(|e| AppError::input(format!("Failed to create output directory '{}': {e}", dir.display())))?;

    let mut written = Vec::new();
    match write_all(dir, run, alignment, with_summary, &mut written) {
        Ok(outputs) => Ok(outputs),
        Err(err) => {
            warn!("Writing outputs failed; removing {} partial file(s)", written.len());
            for path in written.iter().filter(|p| p.exists()) {
                if let Err(e) = remove_file(path) {
                    warn!("Failed to remove {}: {e}", path.display());
                }
            }
            if created_dir {
                // Only succeeds when the directory is empty again.
                let _ = remove_dir(dir);
            }
            Err(err)
        }
    }
}

fn write_all(
    dir: &Path,
    run: &FactorRun,
    alignment: &AlignmentReport,
    with_summary: bool,
    written: &mut Vec<PathBuf>,
) -> Result<WrittenOutputs, AppError> {
    let input = dir.join(INPUT_FILE);
    written.push(input.clone());
    write_dataset_csv(&input, &run.input)?;
    info!("Input table saved to {}", input.display());

    let report = dir.join(REPORT_FILE);
    written.push(report.clone());
    write_loadings_report(&report, &run.result)?;
    info!("Loadings and noise variance saved to {}", report.display());

    let factors = dir.join(FACTORS_FILE);
    written.push(factors.clone());
    write_factors_csv(&factors, &run.result)?;
    info!("Factors saved to {}", factors.display());

    let summary = if with_summary {
        let path = dir.join(SUMMARY_FILE);
        written.push(path.clone());
        write_summary_json(&path, &build_run_summary(run, alignment))?;
        info!("Run summary saved to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(WrittenOutputs {
        input,
        report,
        factors,
        summary,
    })
}

/// Write a dataset's columns as CSV. The index is not written.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record(dataset.column_names())
        .map_err(|e| AppError::input(format!("Failed to write CSV header to '{}': {e}", path.display())))?;

    for row in 0..dataset.n_rows() {
        let record: Vec<String> = dataset
            .columns
            .iter()
            .map(|c| format_cell(&c.data, row))
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| AppError::input(format!("Failed to write CSV row to '{}': {e}", path.display())))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush CSV '{}': {e}", path.display())))
}

/// Write factor scores as CSV, one column per factor.
pub fn write_factors_csv(path: &Path, result: &FactorAnalysisResult) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record(&result.factor_names)
        .map_err(|e| AppError::input(format!("Failed to write factors header: {e}")))?;
    for row in result.factors.row_iter() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| AppError::input(format!("Failed to write factors row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush CSV '{}': {e}", path.display())))
}

/// Write the loadings / noise-variance text report.
pub fn write_loadings_report(path: &Path, result: &FactorAnalysisResult) -> Result<(), AppError> {
    std::fs::write(path, crate::report::format_loadings_report(result))
        .map_err(|e| AppError::input(format!("Failed to write report '{}': {e}", path.display())))
}

/// Write raw (unindexed) tables as `<id>.csv` files into `dir`.
pub fn write_raw_tables<'a>(
    dir: &Path,
    datasets: impl IntoIterator<Item = &'a Dataset>,
) -> Result<Vec<PathBuf>, AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::input(format!("Failed to create directory '{}': {e}", dir.display())))?;

    let mut written = Vec::new();
    for dataset in datasets {
        let path = dir.join(format!("{}.csv", dataset.id));
        write_dataset_csv(&path, dataset)?;
        written.push(path);
    }
    Ok(written)
}

fn format_cell(data: &ColumnData, row: usize) -> String {
    match data {
        ColumnData::Numeric(v) => match v.get(row) {
            Some(x) if !x.is_nan() => x.to_string(),
            _ => String::new(),
        },
        ColumnData::Text(v) => v.get(row).cloned().flatten().unwrap_or_default(),
        ColumnData::Temporal(v) => v
            .get(row)
            .copied()
            .flatten()
            .map(format_timestamp)
            .unwrap_or_default(),
    }
}

fn format_timestamp(t: Timestamp) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
}
