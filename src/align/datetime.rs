//! Datetime column detection and index promotion.
//!
//! For every dataset we look for the first text column that reads as
//! timestamps, convert it to UTC instants and make it the dataset index.
//!
//! Detection is deliberately strict about formats (a fixed, ordered list) but
//! permissive about values: a cell that does not parse simply counts against
//! the column's parse ratio.

use chrono::NaiveDateTime;
use log::{debug, info, warn};

use crate::domain::{Column, ColumnData, Dataset, TimeSeriesCollection, Timestamp};

/// A column is accepted when strictly more than this fraction of its rows parse.
pub const PARSE_THRESHOLD: f64 = 0.95;

/// Supported timestamp layouts, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeFormat {
    /// `2024-01-01T12:00:00.250Z`
    IsoFractionalZ,
    /// `2024-01-01T12:00:00Z`
    IsoZ,
    /// `2024-01-01 12:00:00` (read as UTC)
    SpaceSeparated,
}

impl DatetimeFormat {
    pub const ALL: [DatetimeFormat; 3] = [
        DatetimeFormat::IsoFractionalZ,
        DatetimeFormat::IsoZ,
        DatetimeFormat::SpaceSeparated,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            DatetimeFormat::IsoFractionalZ => "%Y-%m-%dT%H:%M:%S.%fZ",
            DatetimeFormat::IsoZ => "%Y-%m-%dT%H:%M:%SZ",
            DatetimeFormat::SpaceSeparated => "%Y-%m-%d %H:%M:%S",
        }
    }

    /// Parse a single cell. Returns `None` for anything that does not match.
    pub fn parse(self, raw: &str) -> Option<Timestamp> {
        let raw = raw.trim();
        let naive = match self {
            DatetimeFormat::IsoFractionalZ => {
                // chrono's `%.f` also matches an absent fraction.
                if !raw.contains('.') {
                    return None;
                }
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ").ok()
            }
            DatetimeFormat::IsoZ => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ").ok(),
            DatetimeFormat::SpaceSeparated => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok(),
        };
        naive.map(|n| n.and_utc())
    }
}

/// Parse with the first supported format that accepts the value.
pub fn parse_any(raw: &str) -> Option<Timestamp> {
    DatetimeFormat::ALL.iter().find_map(|f| f.parse(raw))
}

/// Fraction of rows that parse under `format`. Missing cells count as failures.
pub fn parse_ratio(values: &[Option<String>], format: DatetimeFormat) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let ok = values
        .iter()
        .filter(|v| v.as_deref().and_then(|s| format.parse(s)).is_some())
        .count();
    ok as f64 / values.len() as f64
}

/// First format (in detection order) under which the column clears the threshold.
pub fn detect_format(values: &[Option<String>]) -> Option<DatetimeFormat> {
    DatetimeFormat::ALL
        .into_iter()
        .find(|&f| parse_ratio(values, f) > PARSE_THRESHOLD)
}

/// All text columns that read as timestamps, in column order.
pub fn find_datetime_columns(dataset: &Dataset) -> Vec<(String, DatetimeFormat)> {
    dataset
        .columns
        .iter()
        .filter_map(|c| match &c.data {
            ColumnData::Text(values) => detect_format(values).map(|f| (c.name.clone(), f)),
            _ => None,
        })
        .collect()
}

/// A column that was promoted to a dataset index.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotedColumn {
    pub dataset: String,
    pub column: String,
    pub format: DatetimeFormat,
    /// Rows removed because their timestamp did not parse.
    pub dropped_rows: usize,
}

/// What the normalizer did to the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub promoted: Vec<PromotedColumn>,
    /// Datasets left without a datetime index.
    pub unindexed: Vec<String>,
}

/// Detect and promote the datetime column of one dataset.
///
/// Already-indexed datasets are returned unchanged.
pub fn normalize_dataset(mut dataset: Dataset) -> (Dataset, Option<PromotedColumn>) {
    if dataset.is_indexed() {
        return (dataset, None);
    }

    let candidates = find_datetime_columns(&dataset);
    let Some((name, format)) = candidates.first().cloned() else {
        warn!("No datetime column to normalise in {}", dataset.id);
        return (dataset, None);
    };
    info!("Found {} datetime column(s) in {}", candidates.len(), dataset.id);
    if candidates.len() > 1 {
        debug!(
            "{}: ignoring additional datetime columns {:?}",
            dataset.id,
            candidates[1..].iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>()
        );
    }

    for column in dataset.columns.iter_mut().filter(|c| c.name == name) {
        if let ColumnData::Text(values) = &column.data {
            let stamps = values
                .iter()
                .map(|v| v.as_deref().and_then(parse_any))
                .collect();
            *column = Column::new(name.clone(), ColumnData::Temporal(stamps));
        }
    }

    let Some(dropped_rows) = dataset.promote_index(&name) else {
        warn!("{}: could not promote column '{name}' to the index", dataset.id);
        return (dataset, None);
    };
    if dropped_rows > 0 {
        warn!(
            "{}: dropped {dropped_rows} row(s) with unparseable timestamps in '{name}'",
            dataset.id
        );
    }
    info!("Normalised datetime column '{name}' and set as index for {}", dataset.id);

    let promoted = PromotedColumn {
        dataset: dataset.id.clone(),
        column: name,
        format,
        dropped_rows,
    };
    (dataset, Some(promoted))
}

/// Normalize every dataset of the collection.
pub fn normalize_datetimes(collection: TimeSeriesCollection) -> (TimeSeriesCollection, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut out = TimeSeriesCollection::new();

    for dataset in collection {
        let (dataset, promoted) = normalize_dataset(dataset);
        match promoted {
            Some(p) => report.promoted.push(p),
            None if !dataset.is_indexed() => report.unindexed.push(dataset.id.clone()),
            None => {}
        }
        out.insert(dataset);
    }

    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn text(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|s| if s.is_empty() { None } else { Some(s.to_string()) })
            .collect()
    }

    #[test]
    fn formats_parse_their_own_layout_only() {
        let frac = "2024-03-01T10:00:00.500Z";
        let iso = "2024-03-01T10:00:00Z";
        let space = "2024-03-01 10:00:00";

        assert!(DatetimeFormat::IsoFractionalZ.parse(frac).is_some());
        assert!(DatetimeFormat::IsoFractionalZ.parse(iso).is_none());
        assert!(DatetimeFormat::IsoZ.parse(iso).is_some());
        assert!(DatetimeFormat::IsoZ.parse(space).is_none());
        assert!(DatetimeFormat::SpaceSeparated.parse(space).is_some());
        assert!(DatetimeFormat::SpaceSeparated.parse(iso).is_none());

        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_any(space), Some(expected));
        assert_eq!(parse_any(iso), Some(expected));
        let with_frac = parse_any(frac).unwrap();
        assert_eq!(with_frac.timestamp_millis(), expected.timestamp_millis() + 500);
    }

    #[test]
    fn threshold_is_strict() {
        // 19/20 = 0.95 is not enough.
        let mut values = vec!["2024-01-01 00:00:00"; 19];
        values.push("n/a");
        assert_eq!(detect_format(&text(&values)), None);

        // 20/21 > 0.95.
        let mut values = vec!["2024-01-01 00:00:00"; 20];
        values.push("n/a");
        assert_eq!(detect_format(&text(&values)), Some(DatetimeFormat::SpaceSeparated));
    }

    #[test]
    fn empty_column_is_rejected() {
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn first_matching_column_wins() {
        let ds = Dataset::new(
            "d",
            vec![
                Column::text("label", ["a", "b"]),
                Column::numeric("value", vec![1.0, 2.0]),
                Column::text("created", ["2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"]),
                Column::text("updated", ["2024-01-01 00:00:00", "2024-01-01 00:02:00"]),
            ],
        );

        let found = find_datetime_columns(&ds);
        assert_eq!(found.len(), 2);

        let (ds, promoted) = normalize_dataset(ds);
        let promoted = promoted.unwrap();
        assert_eq!(promoted.column, "created");
        assert_eq!(promoted.format, DatetimeFormat::IsoZ);
        assert_eq!(ds.column_names(), vec!["label", "value", "updated"]);
        assert_eq!(ds.index.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn dataset_without_datetime_is_left_unindexed() {
        let collection: TimeSeriesCollection = vec![
            Dataset::new("plain", vec![Column::text("name", ["x", "y"]), Column::numeric("v", vec![1.0, 2.0])]),
            Dataset::new("timed", vec![Column::text("ts", ["2024-01-01 00:00:00", "2024-01-01 00:00:01"])]),
        ]
        .into_iter()
        .collect();

        let (out, report) = normalize_datetimes(collection);
        assert_eq!(report.unindexed, vec!["plain".to_string()]);
        assert_eq!(report.promoted.len(), 1);
        assert!(!out.get("plain").unwrap().is_indexed());
        assert!(out.get("timed").unwrap().is_indexed());
    }

    #[test]
    fn mixed_layouts_still_parse_after_detection() {
        // Detection picks the space-separated layout, but the odd ISO cell
        // still becomes a valid timestamp.
        let mut cells = vec!["2024-01-01 00:00:00".to_string(); 30];
        cells.push("2024-01-01T00:00:31Z".to_string());
        let ds = Dataset::new("m", vec![Column::text("when", cells)]);

        let (ds, promoted) = normalize_dataset(ds);
        assert_eq!(promoted.unwrap().dropped_rows, 0);
        assert_eq!(ds.n_rows(), 31);
    }
}
