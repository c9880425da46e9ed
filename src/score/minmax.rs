//! Min-max score: each feature scaled to [0, 1], averaged per row.

use rayon::prelude::*;

use crate::data::FeatureMatrix;

/// Scale values to [0, 1]. A constant column maps to 0.0.
pub(crate) fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Mean of the row's normalized feature values.
pub(crate) fn score(matrix: &FeatureMatrix) -> Vec<f64> {
    let n_cols = matrix.columns.len();
    if n_cols == 0 {
        return vec![0.0; matrix.height()];
    }
    let normalized: Vec<Vec<f64>> = matrix.columns.par_iter().map(|c| normalize(c)).collect();

    (0..matrix.height())
        .map(|row| normalized.iter().map(|col| col[row]).sum::<f64>() / n_cols as f64)
        .collect()
}
