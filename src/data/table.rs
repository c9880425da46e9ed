//! Student Table Module
//! In-memory table of student records backed by a Polars DataFrame.

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Whether a Polars dtype is treated as a numeric feature column.
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// A loaded (and possibly scored) table of student records.
///
/// The table is immutable once built: every transformation returns a new
/// `StudentTable`.
#[derive(Debug, Clone)]
pub struct StudentTable {
    df: DataFrame,
    source_dir: Option<PathBuf>,
}

impl StudentTable {
    pub fn new(df: DataFrame) -> Self {
        Self {
            df,
            source_dir: None,
        }
    }

    pub(crate) fn with_source_dir(mut self, dir: PathBuf) -> Self {
        self.source_dir = Some(dir);
        self
    }

    /// Build a table over a new frame, keeping the source directory.
    pub(crate) fn derive(&self, df: DataFrame) -> Self {
        Self {
            df,
            source_dir: self.source_dir.clone(),
        }
    }

    /// Directory the table was loaded from, if it came from the loader.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    /// Column names in table order.
    pub fn columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Names of numeric columns.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    /// Column names paired with their dtype, for listing.
    pub fn describe_columns(&self) -> Vec<(String, DataType)> {
        self.df
            .get_columns()
            .iter()
            .map(|col| (col.name().to_string(), col.dtype().clone()))
            .collect()
    }

    /// Per-row values of a column as f64. Nulls and non-numeric cells are `None`.
    pub fn f64_values(&self, column: &str) -> PolarsResult<Vec<Option<f64>>> {
        let values = self.df.column(column)?.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    }

    /// Per-row values of a column rendered as text. Nulls are `None`.
    pub fn string_values(&self, column: &str) -> PolarsResult<Vec<Option<String>>> {
        let col = self.df.column(column)?;
        (0..col.len())
            .map(|i| col.get(i).map(|value| any_value_label(&value)))
            .collect()
    }

    /// Sorted distinct non-null values of a column, rendered as text.
    pub fn unique_values(&self, column: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .string_values(column)
            .map(|vals| vals.into_iter().flatten().collect())
            .unwrap_or_default();
        values.sort();
        values.dedup();
        values
    }

    /// Keep only the rows at `indices` (ascending), returning a new table.
    pub fn take_rows(&self, indices: &[usize]) -> PolarsResult<Self> {
        let mut keep = vec![false; self.height()];
        for &i in indices {
            if let Some(slot) = keep.get_mut(i) {
                *slot = true;
            }
        }
        self.filter_rows(&keep)
    }

    /// Keep only the rows whose mask entry is `true`.
    pub fn filter_rows(&self, keep: &[bool]) -> PolarsResult<Self> {
        let mask = BooleanChunked::from_slice("mask".into(), keep);
        Ok(self.derive(self.df.filter(&mask)?))
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> PolarsResult<()> {
        let mut file = File::create(path)?;
        let mut df = self.df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
    }
}

/// Render a cell as text without the quoting Polars adds to strings.
pub(crate) fn any_value_label(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some((*s).to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string().trim_matches('"').to_string()),
    }
}
