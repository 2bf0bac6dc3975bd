//! Shared "run pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> normalize -> align granularity -> trim -> numeric projection ->
//! merge/clean -> factor analysis -> persist
//!
//! The CLI can then focus on presentation (printing summaries and plots).

use crate::align::{AlignmentReport, align_collection};
use crate::domain::{RunConfig, TimeSeriesCollection};
use crate::error::AppError;
use crate::factor::{FactorAnalysis, FactorRun, fit_with};
use crate::io::export::{WrittenOutputs, write_run_outputs};
use crate::io::ingest::load_collection;

/// All computed outputs of a single `tsfa run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Aligned, numeric-only collection the model was fitted on.
    pub aligned: TimeSeriesCollection,
    pub alignment: AlignmentReport,
    pub run: FactorRun,
    pub outputs: WrittenOutputs,
}

/// Execute the full pipeline on `config.input_dir`.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, AppError> {
    let raw = load_collection(&config.input_dir)?;
    run_with_collection(raw, config)
}

/// Execute the pipeline on an already loaded collection.
///
/// Outputs are written only once the fit has succeeded.
pub fn run_with_collection(raw: TimeSeriesCollection, config: &RunConfig) -> Result<RunOutput, AppError> {
    let (aligned, alignment) = align_collection(raw);

    let settings = FactorAnalysis::new(config.n_factors)
        .with_max_iter(config.max_iter)
        .with_tol(config.tol);
    let run = fit_with(&aligned, &settings)?;

    let outputs = write_run_outputs(&config.output_dir, &run, &alignment, config.write_summary_json)?;

    Ok(RunOutput {
        aligned,
        alignment,
        run,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::generate_sample;
    use crate::domain::{Column, Dataset, SampleConfig, Timestamp};
    use crate::error::{EXIT_INPUT, EXIT_NO_DATA};
    use crate::io::export::{FACTORS_FILE, INPUT_FILE, REPORT_FILE, SUMMARY_FILE, write_raw_tables};
    use crate::io::summary::read_run_summary;
    use chrono::{Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};
    use std::path::Path;

    fn config(input: &Path, output: &Path, n_factors: usize) -> RunConfig {
        RunConfig {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            n_factors,
            max_iter: 1000,
            tol: 1e-2,
            plot: false,
            plot_width: 80,
            plot_height: 10,
            write_summary_json: true,
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    /// A raw table sampled every `step` seconds over `[from, to]` (seconds from `t0`).
    fn sensor(id: &str, step: i64, from: i64, to: i64, column: &str, rng: &mut StdRng) -> Dataset {
        let normal = Normal::new(0.0, 1.0).unwrap();
        let stamps: Vec<String> = (from..=to)
            .step_by(step as usize)
            .map(|s| (t0() + Duration::seconds(s)).format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        let values: Vec<f64> = stamps.iter().map(|_| normal.sample(rng)).collect();
        Dataset::new(id, vec![Column::text("timestamp", stamps), Column::numeric(column, values)])
    }

    fn multi_rate_collection() -> TimeSeriesCollection {
        let mut rng = StdRng::seed_from_u64(5);
        vec![
            sensor("fast", 1, 0, 600, "a", &mut rng),
            sensor("mid", 5, 60, 900, "b", &mut rng),
            sensor("slow", 60, -120, 720, "c", &mut rng),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn multi_rate_datasets_align_to_the_coarsest_and_fit() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("out");
        let cfg = config(Path::new("unused"), &output, 2);

        let out = run_with_collection(multi_rate_collection(), &cfg).unwrap();

        let reference = out.alignment.reference.clone().unwrap();
        assert_eq!(reference.dataset, "slow");
        assert!((reference.granularity_secs - 60.0).abs() < 1e-9);

        let window = out.alignment.window.unwrap();
        assert_eq!(window.start, t0() + Duration::seconds(60));
        assert_eq!(window.end, t0() + Duration::seconds(600));

        // Every dataset now sits on the 60s grid inside the window.
        for ds in out.aligned.iter() {
            let index = ds.index.as_ref().unwrap();
            assert_eq!(index.len(), 10, "{}", ds.id);
            assert!(index.iter().all(|t| *t >= window.start && *t <= window.end));
            assert!(index.windows(2).all(|w| (w[1] - w[0]).num_seconds() == 60));
        }

        let result = &out.run.result;
        assert_eq!(result.factors.shape(), (10, 2));
        assert_eq!(result.loadings.shape(), (2, 3));
        assert_eq!(result.noise_variance.len(), 3);
        assert_eq!(result.columns, vec!["a", "b", "c"]);

        for file in [INPUT_FILE, REPORT_FILE, FACTORS_FILE, SUMMARY_FILE] {
            assert!(output.join(file).is_file(), "missing {file}");
        }
        let factors = std::fs::read_to_string(output.join(FACTORS_FILE)).unwrap();
        assert_eq!(factors.lines().count(), 11);
        assert_eq!(factors.lines().next(), Some("Factor_1,Factor_2"));
    }

    #[test]
    fn unparseable_dataset_is_excluded_and_run_succeeds() {
        let out_dir = tempfile::tempdir().unwrap();
        let mut collection = multi_rate_collection();
        collection.insert(Dataset::new(
            "notes",
            vec![
                Column::text("when", ["soon", "later", "never"]),
                Column::numeric("score", vec![1.0, 2.0, 3.0]),
            ],
        ));

        let out = run_with_collection(collection, &config(Path::new("unused"), out_dir.path(), 1)).unwrap();
        assert_eq!(out.alignment.excluded, vec!["notes".to_string()]);
        assert_eq!(out.run.result.columns, vec!["a", "b", "c"]);

        let summary = read_run_summary(&out_dir.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary.excluded, vec!["notes".to_string()]);
        assert_eq!(summary.datasets, vec!["fast", "mid", "notes", "slow"]);
    }

    #[test]
    fn numeric_free_input_fails_and_writes_nothing() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("out");
        let collection: TimeSeriesCollection = vec![Dataset::new(
            "labels",
            vec![
                Column::text("ts", ["2024-01-01 00:00:00", "2024-01-01 00:01:00"]),
                Column::text("label", ["x", "y"]),
            ],
        )]
        .into_iter()
        .collect();

        let err = run_with_collection(collection, &config(Path::new("unused"), &output, 1)).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
        assert!(!output.exists());
    }

    #[test]
    fn factor_count_equal_to_column_count_is_rejected() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("out");

        let err = run_with_collection(multi_rate_collection(), &config(Path::new("unused"), &output, 3)).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.message().contains("between 1 and 2"), "{}", err.message());
        assert!(!output.exists());
    }

    #[test]
    fn sample_directory_round_trips_through_the_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data");
        let output = dir.path().join("output");

        let sample = SampleConfig {
            output_dir: input.clone(),
            seed: 9,
            minutes: 30,
            start: t0(),
        };
        let datasets = generate_sample(&sample).unwrap();
        write_raw_tables(&input, &datasets).unwrap();

        let out = run_pipeline(&config(&input, &output, 5)).unwrap();

        assert_eq!(out.alignment.reference.as_ref().map(|r| r.dataset.as_str()), Some("slow_sensor"));
        assert!(out.alignment.excluded.is_empty());
        assert_eq!(out.alignment.normalize.promoted.len(), 3);

        let result = &out.run.result;
        assert_eq!(result.index.len(), 31);
        assert_eq!(result.columns.len(), 7);
        assert_eq!(result.factors.shape(), (31, 5));
        assert!(result.factors.iter().all(|v| v.is_finite()));

        let summary = read_run_summary(&output.join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary.n_rows, 31);
        assert_eq!(summary.window_start, Some(t0()));
        assert_eq!(summary.loadings.len(), 5);
        assert!(summary.loadings.iter().all(|row| row.len() == 7));
    }
}
