//! Sampling-rate harmonization.
//!
//! The dataset with the coarsest sampling (largest mean step) becomes the
//! reference. Every other dataset is reindexed onto the timestamps it shares
//! with the reference, forward-filling from the most recent observation.

use std::collections::HashSet;

use chrono::TimeDelta;
use log::{debug, info, warn};

use crate::domain::{Dataset, TimeSeriesCollection, Timestamp};

/// The dataset every other dataset is aligned to.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub dataset: String,
    pub granularity_secs: f64,
}

/// Mean step between consecutive index entries, in seconds.
///
/// Steps are taken in row order, so an unsorted index can produce negative
/// steps. Fewer than two rows have no granularity.
pub fn granularity_seconds(index: &[Timestamp]) -> Option<f64> {
    if index.len() < 2 {
        return None;
    }
    let total: f64 = index.windows(2).map(|w| delta_seconds(w[1] - w[0])).sum();
    Some(total / (index.len() - 1) as f64)
}

fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Pick the coarsest dataset. Ties go to the first identifier in collection order.
pub fn select_reference(collection: &TimeSeriesCollection) -> Option<Reference> {
    let mut best: Option<Reference> = None;

    for dataset in collection.iter() {
        let Some(g) = dataset.index.as_deref().and_then(granularity_seconds) else {
            debug!("{}: no granularity (unindexed or fewer than 2 rows)", dataset.id);
            continue;
        };
        if !g.is_finite() {
            continue;
        }
        debug!("{}: granularity {g:.3}s", dataset.id);

        let replace = match &best {
            Some(b) => g > b.granularity_secs,
            None => true,
        };
        if replace {
            best = Some(Reference {
                dataset: dataset.id.clone(),
                granularity_secs: g,
            });
        }
    }

    best
}

/// Drop repeated timestamps (first occurrence wins), then sort rows by time.
pub fn dedup_sorted(dataset: &Dataset) -> Dataset {
    let Some(index) = &dataset.index else {
        return dataset.clone();
    };

    let mut seen = HashSet::with_capacity(index.len());
    let mut rows: Vec<usize> = (0..index.len()).filter(|&i| seen.insert(index[i])).collect();
    rows.sort_by_key(|&i| index[i]);

    let new_index = rows.iter().map(|&i| index[i]).collect();
    let rows: Vec<Option<usize>> = rows.into_iter().map(Some).collect();
    dataset.select_rows(&rows, Some(new_index))
}

/// Reindex a sorted, duplicate-free dataset onto `target` with forward fill.
///
/// Each target timestamp takes the row of the latest timestamp at or before
/// it; a target earlier than every observation gets undefined cells.
pub fn reindex_ffill(dataset: &Dataset, target: &[Timestamp]) -> Dataset {
    let Some(index) = &dataset.index else {
        return dataset.clone();
    };

    let rows: Vec<Option<usize>> = target
        .iter()
        .map(|t| {
            let pos = index.partition_point(|x| x <= t);
            pos.checked_sub(1)
        })
        .collect();

    dataset.select_rows(&rows, Some(target.to_vec()))
}

/// Align every dataset onto the reference dataset's timestamps.
///
/// Unindexed datasets pass through untouched.
pub fn align_granularity(collection: TimeSeriesCollection) -> (TimeSeriesCollection, Option<Reference>) {
    let Some(reference) = select_reference(&collection) else {
        warn!("No dataset has a measurable granularity; skipping granularity alignment");
        return (collection, None);
    };
    info!(
        "Least granular time series: {}, granularity: {} seconds",
        reference.dataset, reference.granularity_secs
    );

    let reference_index: HashSet<Timestamp> = collection
        .get(&reference.dataset)
        .and_then(|d| d.index.as_ref())
        .map(|idx| idx.iter().copied().collect())
        .unwrap_or_default();

    let aligned = collection
        .into_iter()
        .map(|dataset| {
            if dataset.id == reference.dataset || !dataset.is_indexed() {
                return dataset;
            }
            let deduped = dedup_sorted(&dataset);
            let target: Vec<Timestamp> = deduped
                .index
                .iter()
                .flatten()
                .filter(|t| reference_index.contains(*t))
                .copied()
                .collect();
            let resampled = reindex_ffill(&deduped, &target);
            info!(
                "Resampled {} to match the granularity of {} ({} -> {} rows)",
                resampled.id,
                reference.dataset,
                dataset.n_rows(),
                resampled.n_rows()
            );
            resampled
        })
        .collect();

    (aligned, Some(reference))
}
