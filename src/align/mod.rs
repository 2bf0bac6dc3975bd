//! Time-series alignment pipeline.
//!
//! Stages, in order (each consumes a collection and returns a new one):
//!
//! 1. `datetime`    - detect and promote a datetime index
//! 2. unindexed datasets are excluded (they cannot be aligned)
//! 3. `granularity` - resample onto the coarsest dataset's timestamps
//! 4. `trim`        - restrict to the common datetime window
//! 5. `numeric`     - drop non-numeric columns

use log::warn;

use crate::domain::TimeSeriesCollection;

pub mod datetime;
pub mod granularity;
pub mod numeric;
pub mod trim;

pub use datetime::{DatetimeFormat, NormalizeReport, PromotedColumn, normalize_datetimes};
pub use granularity::{Reference, align_granularity};
pub use numeric::keep_numeric;
pub use trim::{CommonWindow, trim_to_common_range};

/// Everything the alignment stages decided, for reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentReport {
    pub normalize: NormalizeReport,
    /// Datasets removed because no datetime column was found.
    pub excluded: Vec<String>,
    pub reference: Option<Reference>,
    pub window: Option<CommonWindow>,
}

/// Remove datasets without a datetime index.
pub fn exclude_unindexed(collection: TimeSeriesCollection) -> (TimeSeriesCollection, Vec<String>) {
    let mut excluded = Vec::new();
    let kept = collection
        .into_iter()
        .filter(|d| {
            if d.is_indexed() {
                true
            } else {
                warn!("Excluding {} from alignment: it has no datetime index", d.id);
                excluded.push(d.id.clone());
                false
            }
        })
        .collect();
    (kept, excluded)
}

/// Run every alignment stage.
pub fn align_collection(collection: TimeSeriesCollection) -> (TimeSeriesCollection, AlignmentReport) {
    let (collection, normalize) = normalize_datetimes(collection);
    let (collection, excluded) = exclude_unindexed(collection);
    let (collection, reference) = align_granularity(collection);
    let (collection, window) = trim_to_common_range(collection);
    let collection = keep_numeric(collection);

    let report = AlignmentReport {
        normalize,
        excluded,
        reference,
        window,
    };
    (collection, report)
}
