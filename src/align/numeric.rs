//! Keep numeric value columns only.

use log::info;

use crate::domain::{Dataset, TimeSeriesCollection};

pub fn project_dataset(mut dataset: Dataset) -> Dataset {
    let before = dataset.columns.len();
    dataset.columns.retain(|c| c.is_numeric());
    let dropped = before - dataset.columns.len();
    if dropped > 0 {
        info!("Kept only numeric columns for {} (dropped {dropped})", dataset.id);
    }
    dataset
}

pub fn keep_numeric(collection: TimeSeriesCollection) -> TimeSeriesCollection {
    collection.into_iter().map(project_dataset).collect()
}
