//! Command-line parsing for the time-series factor analysis tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the alignment/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "tsfa",
    version,
    about = "Align multi-rate time-series CSVs and extract latent factors"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load, align and factor-analyse a directory of CSV files.
    ///
    /// This is the default: `tsfa --input data` behaves like `tsfa run --input data`.
    Run(RunArgs),
    /// Write a synthetic multi-rate sensor directory for trying out `run`.
    Sample(SampleArgs),
    /// Print a previously written run summary JSON.
    Show(ShowArgs),
}

/// Options for an analysis run.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Directory holding the input CSV files.
    #[arg(short, long, env = "TSFA_INPUT_DIR", default_value = "data")]
    pub input: PathBuf,

    /// Directory the outputs are written to (created on success).
    #[arg(short, long, env = "TSFA_OUTPUT_DIR", default_value = "output")]
    pub output: PathBuf,

    /// Number of latent factors to extract.
    #[arg(short = 'k', long, env = "TSFA_FACTORS", default_value_t = 5)]
    pub factors: usize,

    /// Maximum EM iterations.
    #[arg(long, default_value_t = 1000)]
    pub max_iter: usize,

    /// Log-likelihood convergence tolerance.
    #[arg(long, default_value_t = 1e-2)]
    pub tol: f64,

    /// Render ASCII plots of the aligned datasets and the factors.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Skip writing `run_summary.json`.
    #[arg(long)]
    pub no_summary_json: bool,
}

/// Options for synthetic sample generation.
#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Directory the sample CSV files are written to.
    #[arg(short, long, env = "TSFA_INPUT_DIR", default_value = "data")]
    pub output: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Length of the window shared by all sensors, in minutes.
    #[arg(long, default_value_t = 60)]
    pub minutes: u32,

    /// Start of the shared window (UTC), e.g. `2024-01-01 00:00:00`.
    #[arg(long, default_value = "2024-01-01 00:00:00")]
    pub start: String,
}

/// Options for printing a saved summary.
#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Summary JSON produced by `tsfa run`.
    #[arg(long, value_name = "JSON", default_value = "output/run_summary.json")]
    pub summary: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["tsfa", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.factors, 5);
        assert_eq!(args.max_iter, 1000);
        assert!(!args.plot);
        assert!(!args.no_summary_json);
    }

    #[test]
    fn sample_flags() {
        let cli = Cli::parse_from(["tsfa", "sample", "--seed", "7", "--minutes", "15"]);
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!(args.seed, 7);
        assert_eq!(args.minutes, 15);
    }
}
