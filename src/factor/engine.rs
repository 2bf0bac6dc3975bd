//! Factor-analysis orchestration.
//!
//! `fit` takes an aligned collection and:
//!
//! 1. merges every dataset column-wise on the union of their timestamps
//! 2. warns about undefined cells, replaces infinities, drops non-numeric columns
//! 3. refuses an empty table (fatal) and drops all-undefined columns
//! 4. validates the requested factor count against the retained columns
//! 5. mean-imputes, standardizes and fits the factor model
//! 6. packages scores, loadings and noise variance into a `FactorAnalysisResult`

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};
use nalgebra::DMatrix;

use crate::domain::{
    Column, ColumnData, Dataset, FactorAnalysisResult, FitDiagnostics, TimeSeriesCollection, Timestamp,
};
use crate::error::PipelineError;
use crate::factor::model::FactorAnalysis;
use crate::math::{fill_nan, nan_mean, population_std};

/// Identifier of the merged table.
pub const COMBINED_ID: &str = "combined";

/// Result of a successful fit plus the table it was fitted on.
#[derive(Debug, Clone)]
pub struct FactorRun {
    /// Merged input after cleaning, before imputation.
    pub input: Dataset,
    pub result: FactorAnalysisResult,
}

/// Fit `n_factors` factors with default estimator settings.
pub fn fit(collection: &TimeSeriesCollection, n_factors: usize) -> Result<FactorRun, PipelineError> {
    fit_with(collection, &FactorAnalysis::new(n_factors))
}

/// Fit with explicit estimator settings.
pub fn fit_with(collection: &TimeSeriesCollection, settings: &FactorAnalysis) -> Result<FactorRun, PipelineError> {
    let merged = merge_collection(collection);
    let input = prepare_input(merged)?;
    validate_factor_count(settings.n_factors, input.columns.len())?;

    let x = impute_and_standardize(&input);
    info!(
        "Fitting factor analysis: {} factor(s) on {} row(s) x {} column(s)",
        settings.n_factors,
        x.nrows(),
        x.ncols()
    );

    let model = settings.fit(&x)?;
    let factors = model.transform(&x)?;

    let result = FactorAnalysisResult {
        index: input.index.clone().unwrap_or_default(),
        factor_names: (1..=settings.n_factors).map(|i| format!("Factor_{i}")).collect(),
        factors,
        loadings: model.components.clone(),
        noise_variance: model.noise_variance.clone(),
        columns: input.columns.iter().map(|c| c.name.clone()).collect(),
        diagnostics: FitDiagnostics {
            n_iter: model.n_iter,
            log_likelihood: model.log_likelihood,
            converged: model.converged,
        },
    };

    Ok(FactorRun { input, result })
}

/// Join every indexed dataset on the union of their timestamps.
///
/// Rows a dataset does not have become undefined cells. A column name that is
/// already taken is qualified as `<dataset>.<column>`.
pub fn merge_collection(collection: &TimeSeriesCollection) -> Dataset {
    let union: Vec<Timestamp> = collection
        .iter()
        .filter_map(|d| d.index.as_ref())
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut used: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();

    for dataset in collection.iter() {
        let Some(index) = &dataset.index else {
            warn!("{} has no datetime index and cannot be merged; skipping it", dataset.id);
            continue;
        };

        let mut position: HashMap<Timestamp, usize> = HashMap::with_capacity(index.len());
        for (i, t) in index.iter().enumerate() {
            position.entry(*t).or_insert(i);
        }
        if position.len() < index.len() {
            warn!(
                "{} has {} duplicate timestamp(s); keeping the first of each",
                dataset.id,
                index.len() - position.len()
            );
        }
        let rows: Vec<Option<usize>> = union.iter().map(|t| position.get(t).copied()).collect();

        for column in &dataset.columns {
            let name = unique_column_name(&used, &dataset.id, &column.name);
            if name != column.name {
                debug!("Column '{}' already taken, using '{name}'", column.name);
            }
            used.insert(name.clone());
            columns.push(Column::new(name, column.data.gather(&rows)));
        }
    }

    Dataset::with_index(COMBINED_ID, union, columns)
}

/// `column` if free, else `<dataset>.<column>`, else `<dataset>.<column>#2`, `#3`, ...
fn unique_column_name(used: &HashSet<String>, dataset: &str, column: &str) -> String {
    if !used.contains(column) {
        return column.to_string();
    }
    let qualified = format!("{dataset}.{column}");
    if !used.contains(&qualified) {
        return qualified;
    }
    (2usize..)
        .map(|n| format!("{qualified}#{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(qualified)
}

/// Clean the merged table.
///
/// Undefined and infinite cells, non-numeric and all-undefined columns are
/// recoverable and only logged. An empty result is fatal.
pub fn prepare_input(mut table: Dataset) -> Result<Dataset, PipelineError> {
    let undefined: usize = table.columns.iter().map(|c| c.data.undefined_count()).sum();
    if undefined > 0 {
        warn!("NaN values detected: {undefined} undefined cell(s) in the combined table");
    }

    let mut infinite = 0usize;
    for column in &mut table.columns {
        if let ColumnData::Numeric(values) = &mut column.data {
            for v in values.iter_mut().filter(|v| v.is_infinite()) {
                *v = f64::NAN;
                infinite += 1;
            }
        }
    }
    if infinite > 0 {
        warn!("Infinite values detected: replaced {infinite} cell(s) with NaN");
    }

    let non_numeric: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| !c.is_numeric())
        .map(|c| c.name.as_str())
        .collect();
    if !non_numeric.is_empty() {
        warn!("Data contains non-numeric values; dropping column(s) {non_numeric:?}");
        table.columns.retain(Column::is_numeric);
    }

    if table.columns.is_empty() || table.n_rows() == 0 {
        return Err(PipelineError::EmptyInput(format!(
            "{} column(s) and {} row(s) remain after cleaning",
            table.columns.len(),
            table.n_rows()
        )));
    }

    info!(
        "Number of columns included for factor analysis (and maximum number of factors): {}",
        table.columns.len()
    );
    info!("Columns included are: {:?}", table.column_names());

    table.columns.retain(|c| {
        let all_undefined = c.data.undefined_count() == c.data.len();
        if all_undefined {
            warn!("Dropping column '{}': every value is undefined", c.name);
        }
        !all_undefined
    });
    if table.columns.is_empty() {
        return Err(PipelineError::EmptyInput("every column is entirely undefined".to_string()));
    }

    Ok(table)
}

/// `n_factors` must be at least 1 and strictly below the column count.
pub fn validate_factor_count(n_factors: usize, columns: usize) -> Result<(), PipelineError> {
    if n_factors == 0 || n_factors >= columns {
        return Err(PipelineError::InvalidFactorCount {
            requested: n_factors,
            columns,
        });
    }
    Ok(())
}

/// Mean-impute undefined cells, then scale each column to zero mean and unit
/// (population) variance. Constant columns are only centered.
pub fn impute_and_standardize(table: &Dataset) -> DMatrix<f64> {
    let n = table.n_rows();
    let mut x = DMatrix::zeros(n, table.columns.len());

    for (j, column) in table.columns.iter().enumerate() {
        let Some(values) = column.data.as_numeric() else {
            continue;
        };
        let mut values = values.to_vec();
        let mean = nan_mean(&values).unwrap_or(0.0);
        let filled = fill_nan(&mut values, mean);
        if filled > 0 {
            debug!("Imputed {filled} cell(s) of '{}' with the column mean {mean:.6}", column.name);
        }

        let std = population_std(&values, mean);
        let scale = if std.is_finite() && std > f64::EPSILON { std } else { 1.0 };
        for (i, v) in values.iter().enumerate().take(n) {
            x[(i, j)] = (v - mean) / scale;
        }
    }

    x
}
