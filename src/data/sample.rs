//! Synthetic multi-rate sensor tables.
//!
//! Three sensors observe the same two latent AR(1) factors at different
//! rates and over offset windows:
//!
//! | id            | step | window                        | timestamp format          |
//! |---------------|------|-------------------------------|---------------------------|
//! | `fast_sensor` | 1s   | `[start - 5m, start + W]`     | `2024-01-01T00:00:00.000Z` |
//! | `mid_sensor`  | 5s   | `[start, start + W + 5m]`     | `2024-01-01T00:00:00Z`     |
//! | `slow_sensor` | 60s  | `[start - 10m, start + W + 10m]` | `2024-01-01 00:00:00`   |
//!
//! Every window contains the whole minutes of `[start, start + W]`, so the
//! aligned table has `W + 1` rows.

use chrono::{Duration, DurationRound};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Column, ColumnData, Dataset, SampleConfig, Timestamp};
use crate::error::{AppError, EXIT_NUMERIC};

/// AR(1) persistence of each latent factor (per second).
const FACTOR_PHI: [f64; 2] = [0.995, 0.97];

/// Share of numeric cells left blank.
const BLANK_PROB: f64 = 0.01;

/// One observed column: `offset + loadings . f(t) + noise_sd * e`.
struct Channel {
    name: &'static str,
    offset: f64,
    loadings: [f64; 2],
    noise_sd: f64,
}

struct SensorSpec {
    id: &'static str,
    step_secs: i64,
    /// Window relative to `start`, in seconds; `W` is added to `end`.
    lead_secs: i64,
    tail_secs: i64,
    time_column: &'static str,
    time_format: &'static str,
    label: Option<(&'static str, [&'static str; 2])>,
    channels: &'static [Channel],
}

const SENSORS: [SensorSpec; 3] = [
    SensorSpec {
        id: "fast_sensor",
        step_secs: 1,
        lead_secs: 5 * 60,
        tail_secs: 0,
        time_column: "timestamp",
        time_format: "%Y-%m-%dT%H:%M:%S%.3fZ",
        label: Some(("status", ["OK", "WARN"])),
        channels: &[
            Channel { name: "temperature", offset: 21.0, loadings: [1.5, 0.2], noise_sd: 0.3 },
            Channel { name: "pressure", offset: 1013.0, loadings: [4.0, -1.0], noise_sd: 1.0 },
            Channel { name: "humidity", offset: 45.0, loadings: [-2.0, 1.5], noise_sd: 0.8 },
        ],
    },
    SensorSpec {
        id: "mid_sensor",
        step_secs: 5,
        lead_secs: 0,
        tail_secs: 5 * 60,
        time_column: "time",
        time_format: "%Y-%m-%dT%H:%M:%SZ",
        label: None,
        channels: &[
            Channel { name: "flow", offset: 12.0, loadings: [0.5, 2.0], noise_sd: 0.4 },
            Channel { name: "vibration", offset: 0.0, loadings: [0.1, 0.9], noise_sd: 0.2 },
        ],
    },
    SensorSpec {
        id: "slow_sensor",
        step_secs: 60,
        lead_secs: 10 * 60,
        tail_secs: 10 * 60,
        time_column: "recorded_at",
        time_format: "%Y-%m-%d %H:%M:%S",
        label: Some(("site", ["north", "south"])),
        channels: &[
            Channel { name: "power", offset: 350.0, loadings: [20.0, 5.0], noise_sd: 4.0 },
            Channel { name: "voltage", offset: 230.0, loadings: [-1.0, 3.0], noise_sd: 0.5 },
        ],
    },
];

/// Generate the raw (unindexed) sensor tables, sorted by id.
pub fn generate_sample(config: &SampleConfig) -> Result<Vec<Dataset>, AppError> {
    if config.minutes == 0 {
        return Err(AppError::input("Sample window must be at least one minute."));
    }

    let start = config
        .start
        .duration_trunc(Duration::minutes(1))
        .map_err(|e| AppError::input(format!("Invalid sample start: {e}")))?;
    let window_secs = i64::from(config.minutes) * 60;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| AppError::new(EXIT_NUMERIC, format!("Noise distribution error: {e}")))?;

    // Latent factors at 1s resolution over the union of all sensor windows.
    let lead = SENSORS.iter().map(|s| s.lead_secs).max().unwrap_or(0);
    let tail = SENSORS.iter().map(|s| s.tail_secs).max().unwrap_or(0);
    let n_ticks = (lead + window_secs + tail + 1) as usize;
    let factors = simulate_factors(&mut rng, &normal, n_ticks);

    let datasets = SENSORS
        .iter()
        .map(|sensor| {
            let first = start - Duration::seconds(sensor.lead_secs);
            let last = start + Duration::seconds(window_secs + sensor.tail_secs);
            let offset = (lead - sensor.lead_secs) as usize;
            build_sensor(sensor, first, last, offset, &factors, &mut rng, &normal)
        })
        .collect();

    Ok(datasets)
}

/// Two stationary AR(1) paths with unit variance.
fn simulate_factors(rng: &mut StdRng, normal: &Normal<f64>, n: usize) -> [Vec<f64>; 2] {
    FACTOR_PHI.map(|phi| {
        let innovation = (1.0 - phi * phi).sqrt();
        let mut path = Vec::with_capacity(n);
        let mut f = normal.sample(rng);
        for _ in 0..n {
            path.push(f);
            f = phi * f + innovation * normal.sample(rng);
        }
        path
    })
}

fn build_sensor(
    sensor: &SensorSpec,
    first: Timestamp,
    last: Timestamp,
    tick_offset: usize,
    factors: &[Vec<f64>; 2],
    rng: &mut StdRng,
    normal: &Normal<f64>,
) -> Dataset {
    let step = Duration::seconds(sensor.step_secs);
    let mut stamps = Vec::new();
    let mut t = first;
    while t <= last {
        stamps.push(t);
        t += step;
    }

    let mut columns = vec![Column::text(
        sensor.time_column,
        stamps.iter().map(|t| t.format(sensor.time_format).to_string()),
    )];

    if let Some((name, labels)) = sensor.label {
        let values: Vec<&str> = stamps
            .iter()
            .map(|_| if rng.gen_bool(0.9) { labels[0] } else { labels[1] })
            .collect();
        columns.push(Column::text(name, values));
    }

    for channel in sensor.channels {
        let values = stamps
            .iter()
            .map(|&t| {
                let tick = tick_offset + (t - first).num_seconds() as usize;
                let signal = channel.loadings[0] * factors[0][tick] + channel.loadings[1] * factors[1][tick];
                let noise = channel.noise_sd * normal.sample(rng);
                if rng.gen_bool(BLANK_PROB) {
                    f64::NAN
                } else {
                    channel.offset + signal + noise
                }
            })
            .collect();
        columns.push(Column::new(channel.name, ColumnData::Numeric(values)));
    }

    Dataset::new(sensor.id, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn config(seed: u64, minutes: u32) -> SampleConfig {
        SampleConfig {
            output_dir: PathBuf::from("unused"),
            seed,
            minutes,
            start: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn generates_three_sensors_at_their_rates() {
        let datasets = generate_sample(&config(1, 10)).unwrap();
        let ids: Vec<&str> = datasets.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["fast_sensor", "mid_sensor", "slow_sensor"]);

        // 15 minutes at 1s, 15 minutes at 5s, 30 minutes at 60s (inclusive ends).
        assert_eq!(datasets[0].n_rows(), 15 * 60 + 1);
        assert_eq!(datasets[1].n_rows(), 15 * 12 + 1);
        assert_eq!(datasets[2].n_rows(), 30 + 1);

        assert_eq!(
            datasets[0].column_names(),
            vec!["timestamp", "status", "temperature", "pressure", "humidity"]
        );
        let stamps = match &datasets[2].column("recorded_at").unwrap().data {
            ColumnData::Text(v) => v.clone(),
            other => panic!("unexpected column data {other:?}"),
        };
        assert_eq!(stamps[0].as_deref(), Some("2024-03-01 07:50:00"));
    }

    #[test]
    fn same_seed_same_tables() {
        let a = generate_sample(&config(42, 5)).unwrap();
        let b = generate_sample(&config(42, 5)).unwrap();
        let c = generate_sample(&config(43, 5)).unwrap();

        let values = |ds: &[Dataset]| ds[1].column("flow").unwrap().data.as_numeric().unwrap().to_vec();
        let (va, vb, vc) = (values(&a), values(&b), values(&c));
        assert!(va.iter().zip(&vb).all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
        assert!(va.iter().zip(&vc).any(|(x, y)| x != y));
    }

    #[test]
    fn zero_minutes_is_rejected() {
        assert!(generate_sample(&config(1, 0)).is_err());
    }
}
