//! Shared domain types.
//!
//! Tables are modelled with an explicit column tag (`ColumnData`) instead of
//! runtime type probing, so projection and cleaning are plain `match`es:
//!
//! - raw CSV cells become `Numeric` or `Text` columns at ingest
//! - the datetime normalizer turns one `Text` column into `Temporal` and
//!   promotes it to the dataset index
//! - the numeric projector keeps only `Numeric` columns

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Timestamp type used for every dataset index.
pub type Timestamp = DateTime<Utc>;

/// The tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Temporal,
}

/// Column values.
///
/// Undefined cells are `NaN` for numeric columns and `None` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<Option<String>>),
    Temporal(Vec<Option<Timestamp>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Temporal(_) => ColumnKind::Temporal,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Temporal(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Number of undefined cells (`NaN` or missing).
    pub fn undefined_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_nan()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Temporal(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Build a new column by picking rows by position.
    ///
    /// `None` (or an out-of-range position) yields an undefined cell.
    pub fn gather(&self, rows: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied()).unwrap_or(f64::NAN))
                    .collect(),
            ),
            ColumnData::Text(v) => ColumnData::Text(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).cloned().flatten()))
                    .collect(),
            ),
            ColumnData::Temporal(v) => ColumnData::Temporal(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied().flatten()))
                    .collect(),
            ),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Numeric(values))
    }

    /// Text column where every cell is present.
    pub fn text<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ColumnData::Text(values.into_iter().map(|s| Some(s.into())).collect()),
        )
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == ColumnKind::Numeric
    }
}

/// One source table (one CSV file).
///
/// `index` is `None` until a datetime column has been promoted. When set, it
/// has exactly one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: String,
    pub index: Option<Vec<Timestamp>>,
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            id: id.into(),
            index: None,
            columns,
        }
    }

    pub fn with_index(id: impl Into<String>, index: Vec<Timestamp>, columns: Vec<Column>) -> Self {
        Self {
            id: id.into(),
            index: Some(index),
            columns,
        }
    }

    pub fn n_rows(&self) -> usize {
        match &self.index {
            Some(index) => index.len(),
            None => self.columns.first().map(|c| c.data.len()).unwrap_or(0),
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rebuild the dataset from a row selection and a new index.
    pub fn select_rows(&self, rows: &[Option<usize>], index: Option<Vec<Timestamp>>) -> Dataset {
        Dataset {
            id: self.id.clone(),
            index,
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.gather(rows)))
                .collect(),
        }
    }

    /// Move a `Temporal` column into the index.
    ///
    /// Rows whose timestamp is undefined are dropped. Returns the number of
    /// dropped rows, or `None` when the column is missing or not temporal.
    pub fn promote_index(&mut self, name: &str) -> Option<usize> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name == name && c.kind() == ColumnKind::Temporal)?;
        let column = self.columns.remove(pos);
        let ColumnData::Temporal(stamps) = column.data else {
            return None;
        };

        let keep: Vec<Option<usize>> = stamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| ts.is_some())
            .map(|(i, _)| Some(i))
            .collect();
        let index: Vec<Timestamp> = stamps.iter().flatten().copied().collect();
        let dropped = stamps.len() - index.len();

        *self = self.select_rows(&keep, Some(index));
        Some(dropped)
    }
}

/// All datasets of a run, keyed by identifier.
///
/// Backed by a `BTreeMap`, so iteration is lexicographic by identifier. Every
/// stage relies on this for deterministic tie-breaking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesCollection {
    datasets: BTreeMap<String, Dataset>,
}

impl TimeSeriesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset, replacing (and returning) any dataset with the same id.
    pub fn insert(&mut self, dataset: Dataset) -> Option<Dataset> {
        self.datasets.insert(dataset.id.clone(), dataset)
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }
}

impl FromIterator<Dataset> for TimeSeriesCollection {
    fn from_iter<T: IntoIterator<Item = Dataset>>(iter: T) -> Self {
        let mut out = Self::new();
        for dataset in iter {
            out.insert(dataset);
        }
        out
    }
}

impl IntoIterator for TimeSeriesCollection {
    type Item = Dataset;
    type IntoIter = std::collections::btree_map::IntoValues<String, Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.into_values()
    }
}

/// EM diagnostics of a factor-model fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub n_iter: usize,
    pub log_likelihood: f64,
    pub converged: bool,
}

/// Output of one factor-analysis run.
#[derive(Debug, Clone)]
pub struct FactorAnalysisResult {
    /// Timestamps of the factor rows (same rows as the merged input table).
    pub index: Vec<Timestamp>,
    /// `Factor_1` .. `Factor_N`.
    pub factor_names: Vec<String>,
    /// Factor scores, one row per timestamp, one column per factor.
    pub factors: DMatrix<f64>,
    /// Loadings, one row per factor, one column per input column.
    pub loadings: DMatrix<f64>,
    /// Per-column noise variance.
    pub noise_variance: DVector<f64>,
    /// Input columns used for the fit, in loadings column order.
    pub columns: Vec<String>,
    pub diagnostics: FitDiagnostics,
}

impl FactorAnalysisResult {
    pub fn n_factors(&self) -> usize {
        self.factor_names.len()
    }

    /// Scores of one factor as a plain series.
    pub fn factor_series(&self, factor: usize) -> Vec<f64> {
        self.factors.column(factor).iter().copied().collect()
    }
}

/// Machine-readable record of one run, written as `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tool: String,
    pub datasets: Vec<String>,
    pub promoted: Vec<PromotedIndex>,
    pub excluded: Vec<String>,
    pub reference_dataset: Option<String>,
    pub reference_granularity_secs: Option<f64>,
    pub window_start: Option<Timestamp>,
    pub window_end: Option<Timestamp>,
    pub n_rows: usize,
    pub columns: Vec<String>,
    pub factor_names: Vec<String>,
    /// One inner vector per factor, aligned with `columns`.
    pub loadings: Vec<Vec<f64>>,
    pub noise_variance: Vec<f64>,
    pub diagnostics: FitDiagnostics,
}

/// Which column became the index of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotedIndex {
    pub dataset: String,
    pub column: String,
    pub format: String,
    pub dropped_rows: usize,
}

/// Resolved configuration for `tsfa run`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub n_factors: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub write_summary_json: bool,
}

/// Resolved configuration for `tsfa sample`.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub output_dir: PathBuf,
    pub seed: u64,
    /// Length of the overlapping window shared by all generated sensors.
    pub minutes: u32,
    pub start: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(sec: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + sec, 0).unwrap()
    }

    #[test]
    fn gather_marks_missing_rows_undefined() {
        let numeric = ColumnData::Numeric(vec![1.0, 2.0, 3.0]);
        let picked = numeric.gather(&[Some(2), None, Some(0), Some(9)]);
        let ColumnData::Numeric(v) = picked else { panic!("kind changed") };
        assert_eq!(v[0], 3.0);
        assert!(v[1].is_nan());
        assert_eq!(v[2], 1.0);
        assert!(v[3].is_nan());

        let text = ColumnData::Text(vec![Some("a".into()), None]);
        assert_eq!(
            text.gather(&[Some(1), Some(0), None]),
            ColumnData::Text(vec![None, Some("a".into()), None])
        );
    }

    #[test]
    fn promote_index_drops_undefined_timestamps() {
        let mut ds = Dataset::new(
            "s",
            vec![
                Column::new("t", ColumnData::Temporal(vec![Some(ts(0)), None, Some(ts(2))])),
                Column::numeric("x", vec![1.0, 2.0, 3.0]),
            ],
        );

        let dropped = ds.promote_index("t").unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(ds.index, Some(vec![ts(0), ts(2)]));
        assert_eq!(ds.column_names(), vec!["x"]);
        assert_eq!(ds.columns[0].data, ColumnData::Numeric(vec![1.0, 3.0]));
    }

    #[test]
    fn promote_index_rejects_text_column() {
        let mut ds = Dataset::new("s", vec![Column::text("t", ["2024-01-01"])]);
        assert_eq!(ds.promote_index("t"), None);
        assert!(!ds.is_indexed());
    }

    #[test]
    fn collection_iterates_by_identifier() {
        let collection: TimeSeriesCollection = ["zeta", "alpha", "mid"]
            .into_iter()
            .map(|id| Dataset::new(id, Vec::new()))
            .collect();
        assert_eq!(collection.ids(), vec!["alpha", "mid", "zeta"]);
    }
}
