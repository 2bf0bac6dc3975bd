//! Common-window trimming.

use std::collections::BTreeSet;

use log::{info, warn};

use crate::domain::{Dataset, TimeSeriesCollection, Timestamp};

/// Inclusive time window shared by all datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Intersection of the timestamp sets of all indexed datasets, sorted.
pub fn common_index(collection: &TimeSeriesCollection) -> BTreeSet<Timestamp> {
    let mut indexes = collection.iter().filter_map(|d| d.index.as_ref());
    let Some(first) = indexes.next() else {
        return BTreeSet::new();
    };

    let mut common: BTreeSet<Timestamp> = first.iter().copied().collect();
    for index in indexes {
        let other: BTreeSet<Timestamp> = index.iter().copied().collect();
        common = common.intersection(&other).copied().collect();
        if common.is_empty() {
            break;
        }
    }
    common
}

/// Keep the rows whose timestamp lies inside the window (bounds included).
///
/// This is a range slice: rows missing from other datasets are kept as long
/// as they fall inside the window.
pub fn trim_to_window(dataset: &Dataset, window: CommonWindow) -> Dataset {
    let Some(index) = &dataset.index else {
        return dataset.clone();
    };

    let (rows, new_index): (Vec<Option<usize>>, Vec<Timestamp>) = index
        .iter()
        .enumerate()
        .filter(|(_, t)| **t >= window.start && **t <= window.end)
        .map(|(i, t)| (Some(i), *t))
        .unzip();

    dataset.select_rows(&rows, Some(new_index))
}

/// Trim every indexed dataset to the common window.
///
/// An empty intersection is not fatal: the collection is returned unchanged.
pub fn trim_to_common_range(collection: TimeSeriesCollection) -> (TimeSeriesCollection, Option<CommonWindow>) {
    let common = common_index(&collection);
    let (Some(&start), Some(&end)) = (common.first(), common.last()) else {
        warn!("No common datetime range found between the datasets");
        return (collection, None);
    };

    let window = CommonWindow { start, end };
    info!("Largest common datetime range: {start} to {end}");

    let trimmed = collection
        .into_iter()
        .map(|dataset| {
            if !dataset.is_indexed() {
                return dataset;
            }
            let out = trim_to_window(&dataset, window);
            info!(
                "Trimmed {} to the common datetime range ({} -> {} rows)",
                out.id,
                dataset.n_rows(),
                out.n_rows()
            );
            out
        })
        .collect();

    (trimmed, Some(window))
}
