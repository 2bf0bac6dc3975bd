//! Text formatting for run summaries and the loadings report.

use crate::align::AlignmentReport;
use crate::domain::{FactorAnalysisResult, RunConfig, RunSummary};
use crate::factor::FactorRun;

/// Minimum width of a numeric column in the loadings table.
const MIN_CELL_WIDTH: usize = 12;

/// Format the terminal run summary (alignment decisions + fit diagnostics).
pub fn format_run_summary(alignment: &AlignmentReport, run: &FactorRun, config: &RunConfig) -> String {
    let mut out = String::new();
    let result = &run.result;

    out.push_str("=== tsfa - Time-Series Factor Analysis ===\n");
    out.push_str(&format!("Input:  {}\n", config.input_dir.display()));
    out.push_str(&format!("Output: {}\n", config.output_dir.display()));

    out.push_str("\nDatasets:\n");
    for p in &alignment.normalize.promoted {
        let dropped = if p.dropped_rows > 0 {
            format!(" ({} unparseable row(s) dropped)", p.dropped_rows)
        } else {
            String::new()
        };
        out.push_str(&format!(
            "  {:<24} index={} [{}]{dropped}\n",
            truncate(&p.dataset, 24),
            p.column,
            p.format.pattern()
        ));
    }
    for id in &alignment.excluded {
        out.push_str(&format!("  {:<24} excluded (no datetime column)\n", truncate(id, 24)));
    }

    out.push_str("\nAlignment:\n");
    match &alignment.reference {
        Some(r) => out.push_str(&format!(
            "  reference: {} (granularity {:.3}s)\n",
            r.dataset, r.granularity_secs
        )),
        None => out.push_str("  reference: none\n"),
    }
    match &alignment.window {
        Some(w) => out.push_str(&format!(
            "  window:    {} .. {}\n",
            w.start.format("%Y-%m-%d %H:%M:%S"),
            w.end.format("%Y-%m-%d %H:%M:%S")
        )),
        None => out.push_str("  window:    none (no common timestamps)\n"),
    }

    out.push_str(&format!(
        "\nFactor analysis: k={} | rows={} | columns={}\n",
        result.n_factors(),
        result.index.len(),
        result.columns.len()
    ));
    out.push_str(&format!("  columns: {}\n", result.columns.join(", ")));
    let status = if result.diagnostics.converged { "converged" } else { "not converged" };
    out.push_str(&format!(
        "  EM: {status} after {} iteration(s), log-likelihood {:.4}\n",
        result.diagnostics.n_iter, result.diagnostics.log_likelihood
    ));

    out
}

/// Format a summary read back from `run_summary.json`.
pub fn format_saved_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} run summary ===\n", summary.tool));
    out.push_str(&format!("Datasets: {}\n", summary.datasets.join(", ")));
    for p in &summary.promoted {
        out.push_str(&format!("  {:<24} index={} [{}]\n", truncate(&p.dataset, 24), p.column, p.format));
    }
    if !summary.excluded.is_empty() {
        out.push_str(&format!("Excluded: {}\n", summary.excluded.join(", ")));
    }
    if let (Some(id), Some(secs)) = (&summary.reference_dataset, summary.reference_granularity_secs) {
        out.push_str(&format!("Reference: {id} (granularity {secs:.3}s)\n"));
    }
    if let (Some(start), Some(end)) = (summary.window_start, summary.window_end) {
        out.push_str(&format!(
            "Window: {} .. {}\n",
            start.format("%Y-%m-%d %H:%M:%S"),
            end.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out.push_str(&format!(
        "Factors: {} | rows={} | columns={}\n",
        summary.factor_names.len(),
        summary.n_rows,
        summary.columns.len()
    ));

    out.push_str("\nNoise variance:\n");
    let width = summary.columns.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    for (name, v) in summary.columns.iter().zip(&summary.noise_variance) {
        out.push_str(&format!("  {name:<width$} {v:.6}\n"));
    }
    let status = if summary.diagnostics.converged { "converged" } else { "not converged" };
    out.push_str(&format!(
        "\nEM: {status} after {} iteration(s), log-likelihood {:.4}\n",
        summary.diagnostics.n_iter, summary.diagnostics.log_likelihood
    ));

    out
}

/// Format the loadings matrix and noise variance vector.
///
/// Layout:
///
/// ```text
/// Factor Loadings:
/// factor          a          b
/// Factor_1   0.900000   0.800000
///
/// Explained Variance:
/// a   0.190000
/// b   0.360000
/// ```
pub fn format_loadings_report(result: &FactorAnalysisResult) -> String {
    let mut out = String::new();

    let label_width = result
        .factor_names
        .iter()
        .map(|s| s.chars().count())
        .chain(std::iter::once("factor".len()))
        .max()
        .unwrap_or(0);
    let widths: Vec<usize> = result
        .columns
        .iter()
        .map(|c| c.chars().count().max(MIN_CELL_WIDTH))
        .collect();

    out.push_str("Factor Loadings:\n");
    let mut header = format!("{:<label_width$}", "factor");
    for (name, w) in result.columns.iter().zip(&widths) {
        header.push_str(&format!(" {name:>w$}"));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (r, factor) in result.factor_names.iter().enumerate() {
        let mut line = format!("{factor:<label_width$}");
        for (c, w) in widths.iter().enumerate() {
            line.push_str(&format!(" {:>w$.6}", result.loadings[(r, c)]));
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str("\nExplained Variance:\n");
    let name_width = result.columns.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    for (name, v) in result.columns.iter().zip(result.noise_variance.iter()) {
        out.push_str(&format!("{name:<name_width$} {v:>w$.6}\n", w = MIN_CELL_WIDTH));
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
