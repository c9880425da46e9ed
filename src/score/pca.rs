//! First-principal-component score.
//!
//! Each feature is oriented so that larger means a weaker grade, standardized,
//! and projected on the leading eigenvector of the covariance matrix. The
//! result is shifted so the lowest score is 0.

use statrs::statistics::Statistics;

use super::ValidationError;
use crate::data::FeatureMatrix;

const MAX_SWEEPS: usize = 100;
const TOLERANCE: f64 = 1e-24;
const SIGN_TOLERANCE: f64 = 1e-9;

/// Pearson correlation; NaN when either side has no variance.
pub(crate) fn correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return f64::NAN;
    }
    let sx = x.iter().std_dev();
    let sy = y.iter().std_dev();
    if sx == 0.0 || sy == 0.0 {
        return f64::NAN;
    }
    x.iter().covariance(y.iter()) / (sx * sy)
}

/// Zero mean, unit population variance. Constant columns become all zeros.
fn standardize(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().mean();
    let std = values.iter().population_std_dev();
    if std.is_nan() || std <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Leading eigenvector of a symmetric positive semi-definite matrix, found
/// with cyclic Jacobi rotations. Signed so its components sum to a
/// non-negative value (first non-zero component positive on a tie). `None`
/// when the largest eigenvalue is not positive.
fn leading_eigenvector(cov: &[Vec<f64>]) -> Option<Vec<f64>> {
    let k = cov.len();
    let mut a: Vec<Vec<f64>> = cov.to_vec();
    let mut vectors: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..MAX_SWEEPS {
        let off_diagonal: f64 = (0..k)
            .flat_map(|i| (0..k).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off_diagonal < TOLERANCE {
            break;
        }
        for p in 0..k {
            for q in (p + 1)..k {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (x, y) = (row[p], row[q]);
                    row[p] = c * x - s * y;
                    row[q] = s * x + c * y;
                }
                for r in 0..k {
                    let (x, y) = (a[p][r], a[q][r]);
                    a[p][r] = c * x - s * y;
                    a[q][r] = s * x + c * y;
                }
                for row in vectors.iter_mut() {
                    let (x, y) = (row[p], row[q]);
                    row[p] = c * x - s * y;
                    row[q] = s * x + c * y;
                }
            }
        }
    }

    let lead = (0..k).max_by(|&i, &j| a[i][i].total_cmp(&a[j][j]))?;
    if !(a[lead][lead].is_finite() && a[lead][lead] > 0.0) {
        return None;
    }
    let mut v: Vec<f64> = vectors.iter().map(|row| row[lead]).collect();
    let sum: f64 = v.iter().sum();
    let flip = if sum.abs() > SIGN_TOLERANCE {
        sum < 0.0
    } else {
        v.iter().find(|x| x.abs() > SIGN_TOLERANCE).is_some_and(|x| *x < 0.0)
    };
    if flip {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    Some(v)
}

pub(crate) fn score(
    matrix: &FeatureMatrix,
    features: &[String],
    grade_column: &str,
) -> Result<Vec<f64>, ValidationError> {
    let n = matrix.height();
    if n == 0 {
        return Ok(Vec::new());
    }
    let grade = matrix
        .column(grade_column)
        .ok_or_else(|| ValidationError::UnknownColumn(grade_column.to_string()))?;

    let mut oriented: Vec<Vec<f64>> = Vec::with_capacity(features.len());
    for name in features {
        let Some(values) = matrix.column(name) else {
            return Err(ValidationError::UnknownColumn(name.clone()));
        };
        let r = correlation(values, grade);
        if r.is_nan() || r == 0.0 {
            tracing::debug!("Feature '{}' is uncorrelated with {}; ignored", name, grade_column);
            continue;
        }
        let sign = if r > 0.0 { -1.0 } else { 1.0 };
        oriented.push(standardize(&values.iter().map(|v| v * sign).collect::<Vec<_>>()));
    }
    if oriented.is_empty() {
        return Err(ValidationError::NoInformativeFeatures(grade_column.to_string()));
    }

    let k = oriented.len();
    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let cov: Vec<Vec<f64>> = (0..k)
        .map(|i| {
            (0..k)
                .map(|j| {
                    oriented[i]
                        .iter()
                        .zip(&oriented[j])
                        .map(|(a, b)| a * b)
                        .sum::<f64>()
                        / denom
                })
                .collect()
        })
        .collect();

    let Some(loadings) = leading_eigenvector(&cov) else {
        return Ok(vec![0.0; n]);
    };

    let projected: Vec<f64> = (0..n)
        .map(|row| {
            oriented
                .iter()
                .zip(&loadings)
                .map(|(col, w)| col[row] * w)
                .sum()
        })
        .collect();
    let min = projected.iter().copied().fold(f64::INFINITY, f64::min);
    Ok(projected.into_iter().map(|v| v - min).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation() {
        assert!((correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((correlation(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert!(correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_leading_eigenvector() {
        let cov = vec![vec![2.0, 0.0], vec![0.0, 1.0]];
        let v = leading_eigenvector(&cov).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-6);
        assert!(v[1].abs() < 1e-6);
        assert!(leading_eigenvector(&[vec![0.0]]).is_none());
    }

    #[test]
    fn test_leading_eigenvector_negative_correlation() {
        let cov = vec![vec![1.0, -0.5], vec![-0.5, 1.0]];
        let v = leading_eigenvector(&cov).unwrap();
        let half = std::f64::consts::FRAC_1_SQRT_2;
        assert!((v[0] - half).abs() < 1e-9);
        assert!((v[1] + half).abs() < 1e-9);
    }

    #[test]
    fn test_leading_eigenvector_three_features() {
        // eigenvalues 4, 1, 1 with the leading one along (1, 1, 1)
        let cov = vec![
            vec![2.0, 1.0, 1.0],
            vec![1.0, 2.0, 1.0],
            vec![1.0, 1.0, 2.0],
        ];
        let v = leading_eigenvector(&cov).unwrap();
        let third = 1.0 / 3f64.sqrt();
        assert!(v.iter().all(|x| (x - third).abs() < 1e-9));
    }

    #[test]
    fn test_projection_carries_largest_variance() {
        let grade = vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let a = vec![1.0, 5.0, 2.0, 6.0, 3.0, 4.0];
        let b = vec![3.0, 0.0, 4.0, 1.0, 5.0, 5.0];
        let matrix = FeatureMatrix {
            names: vec!["a".into(), "b".into(), "FinalGrade".into()],
            rows: (0..6).collect(),
            columns: vec![a.clone(), b.clone(), grade],
        };
        let scores = score(&matrix, &["a".to_string(), "b".to_string()], "FinalGrade").unwrap();

        // two standardized features: the largest eigenvalue is n/(n-1) * (1 + |r|)
        let n = 6.0;
        let expected = n / (n - 1.0) * (1.0 + correlation(&a, &b).abs());
        let variance = scores.iter().variance();
        assert!((variance - expected).abs() < 1e-9);
        assert!(variance > n / (n - 1.0));
    }

    #[test]
    fn test_uncorrelated_features_rejected() {
        let matrix = FeatureMatrix {
            names: vec!["flat".into(), "FinalGrade".into()],
            rows: vec![0, 1, 2],
            columns: vec![vec![2.0, 2.0, 2.0], vec![10.0, 12.0, 14.0]],
        };
        let err = score(&matrix, &["flat".to_string()], "FinalGrade").unwrap_err();
        assert!(matches!(err, ValidationError::NoInformativeFeatures(_)));
    }

    #[test]
    fn test_single_feature_shifted_to_zero() {
        let matrix = FeatureMatrix {
            names: vec!["absences".into(), "FinalGrade".into()],
            rows: vec![0, 1, 2],
            columns: vec![vec![0.0, 4.0, 8.0], vec![15.0, 12.0, 9.0]],
        };
        let scores = score(&matrix, &["absences".to_string()], "FinalGrade").unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[0].abs() < 1e-12);
        assert!(scores[1] > 0.0 && scores[2] > scores[1]);
    }
}
