//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` defaults and parses CLI arguments
//! - runs the alignment + factor analysis pipeline
//! - generates synthetic sample directories
//! - prints summaries and plots

use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, RunArgs, SampleArgs, ShowArgs};
use crate::domain::{RunConfig, SampleConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tsfa` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is normal.
    dotenvy::dotenv().ok();

    // We want `tsfa` and `tsfa -k 3` to behave like `tsfa run ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Sample(args) => handle_sample(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let out = pipeline::run_pipeline(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&out.alignment, &out.run, &config)
    );

    if config.plot {
        println!(
            "{}",
            crate::plot::render_dataset_plots(&out.aligned, config.plot_width, config.plot_height)
        );
        println!(
            "{}",
            crate::plot::render_factor_plots(&out.run.result, config.plot_width, config.plot_height)
        );
    }

    println!("Outputs written to {}", config.output_dir.display());
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = sample_config_from_args(&args)?;
    let datasets = crate::data::sample::generate_sample(&config)?;
    let written = crate::io::export::write_raw_tables(&config.output_dir, &datasets)?;

    for path in &written {
        info!("Wrote {}", path.display());
    }
    println!(
        "Wrote {} sample file(s) to {}",
        written.len(),
        config.output_dir.display()
    );
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let summary = crate::io::summary::read_run_summary(&args.summary)?;
    println!("{}", crate::report::format_saved_summary(&summary));
    Ok(())
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        n_factors: args.factors,
        max_iter: args.max_iter,
        tol: args.tol,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        write_summary_json: !args.no_summary_json,
    }
}

pub fn sample_config_from_args(args: &SampleArgs) -> Result<SampleConfig, AppError> {
    let start = crate::align::datetime::parse_any(&args.start)
        .ok_or_else(|| AppError::input(format!("Unrecognised --start timestamp: {}", args.start)))?;
    Ok(SampleConfig {
        output_dir: args.output.clone(),
        seed: args.seed,
        minutes: args.minutes,
        start,
    })
}

/// Rewrite argv so `tsfa` defaults to `tsfa run`.
///
/// Rules:
/// - `tsfa`                        -> `tsfa run`
/// - `tsfa -k 3 ...`               -> `tsfa run -k 3 ...`
/// - `tsfa --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "sample" | "show");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs() {
        assert_eq!(rewrite_args(argv(&["tsfa"])), argv(&["tsfa", "run"]));
    }

    #[test]
    fn leading_flag_runs() {
        assert_eq!(
            rewrite_args(argv(&["tsfa", "-k", "3"])),
            argv(&["tsfa", "run", "-k", "3"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        assert_eq!(rewrite_args(argv(&["tsfa", "sample"])), argv(&["tsfa", "sample"]));
        assert_eq!(rewrite_args(argv(&["tsfa", "--help"])), argv(&["tsfa", "--help"]));
    }

    #[test]
    fn run_config_inverts_summary_flag() {
        let cli = Cli::parse_from(["tsfa", "run", "-k", "2", "--no-summary-json", "--plot"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = run_config_from_args(&args);
        assert_eq!(config.n_factors, 2);
        assert!(config.plot);
        assert!(!config.write_summary_json);
    }

    #[test]
    fn sample_start_accepts_supported_formats() {
        let cli = Cli::parse_from(["tsfa", "sample", "--start", "2024-02-03T04:05:06Z"]);
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        let config = sample_config_from_args(&args).unwrap();
        assert_eq!(config.start.to_rfc3339(), "2024-02-03T04:05:06+00:00");
    }
}
