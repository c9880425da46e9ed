//! CSV Data Loader Module
//! Resolves the data directory and loads every CSV file in it into one table using Polars.

use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::schema::{Schema, SchemaKind};
use super::table::{any_value_label, is_numeric_dtype, StudentTable};

/// Directory of sample data shipped with the crate.
pub const BUNDLED_DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("No data files found in {0}")]
    NoData(PathBuf),
    #[error("No valid data found in {dir}: {skipped} file(s) failed validation")]
    NoValidData { dir: PathBuf, skipped: usize },
    #[error("Schema mismatch in {file}: expected columns [{expected}], found [{found}]")]
    SchemaMismatch {
        file: PathBuf,
        expected: String,
        found: String,
    },
    #[error("{column} must be unique: '{value}' appears more than once")]
    DuplicateId { column: String, value: String },
}

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Used when the requested directory is missing or holds no data files.
    pub default_dir: PathBuf,
    pub id_column: String,
    pub grade_column: String,
    pub schema: SchemaKind,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from(BUNDLED_DATA_DIR),
            id_column: "StudentID".to_string(),
            grade_column: "FinalGrade".to_string(),
            schema: SchemaKind::Student,
        }
    }
}

/// Loads a directory of student CSV files into a single validated table.
pub struct DataLoader {
    config: LoaderConfig,
    schema: Schema,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl DataLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let schema = Schema::new(config.schema, &config.id_column, &config.grade_column);
        Self { config, schema }
    }

    /// Pick the directory to read: `requested` when it holds CSV files,
    /// otherwise the configured default.
    pub fn resolve_directory(&self, requested: &Path) -> PathBuf {
        if requested.as_os_str().is_empty() {
            return self.config.default_dir.clone();
        }
        if !list_data_files(requested).is_empty() {
            return requested.to_path_buf();
        }
        warn!(
            "No data files in {:?}, falling back to {:?}",
            requested, self.config.default_dir
        );
        self.config.default_dir.clone()
    }

    /// Load and validate every CSV file of the resolved directory.
    pub fn load(&self, requested: &Path) -> Result<StudentTable, DataError> {
        let dir = self.resolve_directory(requested);
        let files = list_data_files(&dir);
        if files.is_empty() {
            return Err(DataError::NoData(dir));
        }

        let mut frames: Vec<(PathBuf, DataFrame)> = Vec::with_capacity(files.len());
        let mut skipped = 0;
        for file in files {
            info!("Loading data from {:?}", file);
            let df = match read_csv(&file) {
                Ok(df) => df,
                Err(e) => {
                    warn!("Couldn't read {:?}: {}; skipping file", file, e);
                    skipped += 1;
                    continue;
                }
            };
            match self.schema.validate(&df) {
                Ok(()) => {
                    info!("Data checked and loaded ({} rows)", df.height());
                    frames.push((file, df));
                }
                Err(e) => {
                    warn!("Couldn't validate {:?}: {}; skipping file", file, e);
                    skipped += 1;
                }
            }
        }
        if frames.is_empty() {
            return Err(DataError::NoValidData { dir, skipped });
        }

        let df = concat_frames(frames)?;
        let df = drop_duplicate_rows(&df)?;
        ensure_unique(&df, &self.config.id_column)?;

        info!("Full data ready: {} rows, {} columns", df.height(), df.width());
        Ok(StudentTable::new(df).with_source_dir(dir))
    }
}

/// CSV files directly inside `dir`, sorted by path. Unreadable or missing
/// directories yield no files.
pub fn list_data_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    files
}

/// Read one CSV file and drop every row with a missing cell.
fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .with_ignore_errors(true)
        .finish()?
        .collect()?;

    let complete = df.drop_nulls::<String>(None)?;
    let dropped = df.height() - complete.height();
    if dropped > 0 {
        debug!("Dropped {} incomplete rows from {:?}", dropped, path);
    }
    Ok(complete)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Stack frames that share a column set, aligned to the first frame's order.
fn concat_frames(frames: Vec<(PathBuf, DataFrame)>) -> Result<DataFrame, DataError> {
    let mut iter = frames.into_iter();
    let Some((_, mut acc)) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    let expected = column_names(&acc);
    let expected_set: HashSet<&String> = expected.iter().collect();

    for (file, df) in iter {
        let found = column_names(&df);
        let found_set: HashSet<&String> = found.iter().collect();
        if found_set != expected_set {
            return Err(DataError::SchemaMismatch {
                file,
                expected: expected.join(", "),
                found: found.join(", "),
            });
        }

        let mut aligned = df.select(expected.iter().map(|s| s.as_str()))?;
        for name in &expected {
            let left = acc.column(name)?.dtype().clone();
            let right = aligned.column(name)?.dtype().clone();
            if left == right {
                continue;
            }
            if !(is_numeric_dtype(&left) && is_numeric_dtype(&right)) {
                return Err(DataError::SchemaMismatch {
                    file,
                    expected: format!("{name}: {left}"),
                    found: format!("{name}: {right}"),
                });
            }
            let widened = acc.column(name)?.cast(&DataType::Float64)?;
            acc.with_column(widened)?;
            let widened = aligned.column(name)?.cast(&DataType::Float64)?;
            aligned.with_column(widened)?;
        }
        acc = acc.vstack(&aligned)?;
    }
    Ok(acc)
}

/// Remove exact duplicate rows, keeping the first occurrence.
fn drop_duplicate_rows(df: &DataFrame) -> PolarsResult<DataFrame> {
    let unique = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    let dropped = df.height() - unique.height();
    if dropped > 0 {
        debug!("Dropped {} duplicate rows", dropped);
    }
    Ok(unique)
}

fn ensure_unique(df: &DataFrame, id_column: &str) -> Result<(), DataError> {
    let ids = df.column(id_column)?;
    if ids.as_materialized_series().n_unique()? == ids.len() {
        return Ok(());
    }
    let repeated = df
        .clone()
        .lazy()
        .group_by_stable([col(id_column)])
        .agg([len().alias("count")])
        .filter(col("count").gt(lit(1)))
        .collect()?;
    let value = repeated
        .column(id_column)?
        .get(0)
        .ok()
        .and_then(|v| any_value_label(&v))
        .unwrap_or_default();
    Err(DataError::DuplicateId {
        column: id_column.to_string(),
        value,
    })
}
