//! CSV ingest.
//!
//! Turns a directory of heterogeneous CSV files into a `TimeSeriesCollection`:
//! one dataset per file, identified by the file stem.
//!
//! Column typing happens here, once, so later stages never probe values:
//! - a column is `Numeric` if every present cell parses as `f64`
//!   (`inf` / `NaN` spellings included; an all-missing column is numeric too)
//! - anything else is `Text`
//!
//! Missing-value markers (`""`, `NA`, `N/A`, `null`, ...) become undefined cells.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{debug, info, warn};

use crate::domain::{Column, ColumnData, Dataset, TimeSeriesCollection};
use crate::error::{AppError, EXIT_NO_DATA};

/// Cell spellings read as missing.
const MISSING_MARKERS: [&str; 8] = ["", "NA", "N/A", "n/a", "null", "NULL", "None", "#N/A"];

/// Load every `*.csv` file of `dir`, in file-name order.
pub fn load_collection(dir: &Path) -> Result<TimeSeriesCollection, AppError> {
    if !dir.is_dir() {
        return Err(AppError::input(format!("Directory not found: {}", dir.display())));
    }

    let files = list_csv_files(dir)?;
    if files.is_empty() {
        return Err(AppError::new(
            EXIT_NO_DATA,
            format!("No CSV files found in {}", dir.display()),
        ));
    }

    let mut collection = TimeSeriesCollection::new();
    for path in files {
        let dataset = read_csv_dataset(&path)?;
        info!(
            "Loaded {} ({} row(s), {} column(s))",
            dataset.id,
            dataset.n_rows(),
            dataset.columns.len()
        );
        if let Some(previous) = collection.insert(dataset) {
            warn!("Dataset id '{}' appears more than once; keeping the last file", previous.id);
        }
    }
    Ok(collection)
}

/// Sorted list of CSV files directly inside `dir`.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::input(format!("Failed to read directory '{}': {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::input(format!("Failed to read directory entry: {e}")))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}

/// Read one CSV file into an unindexed dataset.
pub fn read_csv_dataset(path: &Path) -> Result<Dataset, AppError> {
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AppError::input(format!("Invalid file name: {}", path.display())))?
        .to_string();

    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    parse_table(&id, file)
}

/// Parse CSV text (header row first) into an unindexed dataset.
pub fn parse_table<R: Read>(id: &str, reader: R) -> Result<Dataset, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers of {id}: {e}")))?
        .clone();
    let names: Vec<String> = headers.iter().map(normalize_header_name).collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    let mut bad_rows = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                // +2: 1-based lines, after the header.
                debug!("{id}: line {}: CSV parse error: {e}", idx + 2);
                bad_rows += 1;
                continue;
            }
        };
        push_record(&record, &mut cells);
    }
    if bad_rows > 0 {
        warn!("{id}: skipped {bad_rows} malformed row(s)");
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    Ok(Dataset::new(id, columns))
}

fn push_record(record: &StringRecord, cells: &mut [Vec<Option<String>>]) {
    for (i, column) in cells.iter_mut().enumerate() {
        let value = record
            .get(i)
            .filter(|s| !MISSING_MARKERS.contains(s))
            .map(str::to_string);
        column.push(value);
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Decide the column tag from its cells.
pub fn infer_column(name: String, values: Vec<Option<String>>) -> Column {
    let numeric: Option<Vec<f64>> = values
        .iter()
        .map(|v| match v {
            None => Some(f64::NAN),
            Some(s) => parse_number(s),
        })
        .collect();

    match numeric {
        Some(values) => Column::numeric(name, values),
        None => Column::new(name, ColumnData::Text(values)),
    }
}

/// Parse a numeric cell. Accepts `inf`, `-inf`, `NaN` spellings.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}
