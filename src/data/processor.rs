//! Data Processor Module
//! Turns selected table columns into a dense numeric feature matrix.

use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;

use super::table::{is_numeric_dtype, StudentTable};

/// Complete rows of the selected columns, stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    /// Indices (into the source table) of rows with every value present.
    pub rows: Vec<usize>,
    pub columns: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Number of complete rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }
}

/// Handles feature encoding and missing-value removal.
pub struct DataProcessor;

impl DataProcessor {
    /// Encode one column as per-row numbers.
    ///
    /// Numeric columns are cast to f64 (non-finite values become `None`).
    /// Other columns are label-encoded: sorted distinct values map to 0, 1, 2, ...
    pub fn encode_column(table: &StudentTable, name: &str) -> PolarsResult<Vec<Option<f64>>> {
        let column = table.frame().column(name)?;
        if is_numeric_dtype(column.dtype()) {
            return Ok(table
                .f64_values(name)?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect());
        }

        let labels = table.string_values(name)?;
        let codes: BTreeMap<&str, f64> = {
            let mut distinct: Vec<&str> = labels.iter().flatten().map(|s| s.as_str()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            distinct
                .into_iter()
                .enumerate()
                .map(|(i, s)| (s, i as f64))
                .collect()
        };
        Ok(labels
            .iter()
            .map(|v| v.as_deref().and_then(|s| codes.get(s).copied()))
            .collect())
    }

    /// Build the feature matrix for `names`, keeping only rows where every
    /// selected column has a value.
    pub fn feature_matrix(table: &StudentTable, names: &[String]) -> PolarsResult<FeatureMatrix> {
        let encoded: Vec<Vec<Option<f64>>> = names
            .par_iter()
            .map(|name| Self::encode_column(table, name))
            .collect::<PolarsResult<_>>()?;

        let rows: Vec<usize> = (0..table.height())
            .filter(|&i| encoded.iter().all(|col| col[i].is_some()))
            .collect();

        let columns = encoded
            .iter()
            .map(|col| rows.iter().filter_map(|&i| col[i]).collect())
            .collect();

        Ok(FeatureMatrix {
            names: names.to_vec(),
            rows,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_label_encoding_is_sorted() {
        let table = StudentTable::new(df!("Mjob" => ["teacher", "at_home", "health", "at_home"]).unwrap());
        let codes = DataProcessor::encode_column(&table, "Mjob").unwrap();
        assert_eq!(codes, vec![Some(2.0), Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_incomplete_rows_excluded() {
        let table = StudentTable::new(
            df!(
                "Math" => [Some(90.0), Some(50.0), Some(70.0)],
                "Science" => [Some(70.0), None, Some(f64::NAN)],
            )
            .unwrap(),
        );
        let matrix = DataProcessor::feature_matrix(&table, &names(&["Math", "Science"])).unwrap();
        assert_eq!(matrix.rows, vec![0]);
        assert_eq!(matrix.column("Math"), Some(&[90.0][..]));
        assert_eq!(matrix.column("Science"), Some(&[70.0][..]));
        assert_eq!(matrix.column("Art"), None);
    }

    #[test]
    fn test_unknown_column_errors() {
        let table = StudentTable::new(df!("Math" => [1.0]).unwrap());
        assert!(DataProcessor::feature_matrix(&table, &names(&["Art"])).is_err());
    }
}
