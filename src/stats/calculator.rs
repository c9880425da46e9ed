//! Statistics Calculator Module
//! Per-group descriptive statistics and Welch's t-test against a reference group.

use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;

/// Significance threshold for t-test
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Statistics for a single group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub group_name: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub q1: f64,
    pub q3: f64,
    pub p95: f64,
    pub p05: f64,
    pub std_diff_from_reference: Option<f64>,
    pub p_value: Option<f64>,
    pub is_significant: bool,
}

impl Default for GroupStats {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            q1: f64::NAN,
            q3: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
            std_diff_from_reference: None,
            p_value: None,
            is_significant: false,
        }
    }
}

/// Statistics for one metric column across all groups.
#[derive(Debug, Clone, Serialize)]
pub struct MetricStats {
    pub metric: String,
    pub reference_group: String,
    pub group_stats: BTreeMap<String, GroupStats>,
}

impl MetricStats {
    /// Get groups ordered with the reference first.
    pub fn get_ordered_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.group_stats.keys().cloned().collect();

        if let Some(pos) = groups.iter().position(|g| g == &self.reference_group) {
            groups.remove(pos);
            groups.insert(0, self.reference_group.clone());
        }

        groups
    }

    /// Check if any group differs significantly from the reference.
    pub fn has_significant_results(&self) -> bool {
        self.group_stats
            .iter()
            .any(|(name, gs)| name != &self.reference_group && gs.is_significant)
    }
}

/// Split `values` by the parallel `labels`, skipping NaN values.
pub fn values_by_group(values: &[f64], labels: &[String]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (value, label) in values.iter().zip(labels) {
        if !value.is_nan() {
            groups.entry(label.clone()).or_default().push(*value);
        }
    }
    groups
}

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> GroupStats {
        let n = values.len();
        if n == 0 {
            return GroupStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std = variance.sqrt();

        GroupStats {
            count: n,
            mean,
            median,
            std,
            variance,
            q1: Self::percentile(&sorted, 25.0),
            q3: Self::percentile(&sorted, 75.0),
            p95: Self::percentile(&sorted, 95.0),
            p05: Self::percentile(&sorted, 5.0),
            ..GroupStats::default()
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Perform Welch's t-test (independent samples, unequal variance).
    pub fn perform_ttest(group_values: &[f64], reference_values: &[f64]) -> (f64, bool) {
        let n1 = group_values.len() as f64;
        let n2 = reference_values.len() as f64;

        if n1 < 2.0 || n2 < 2.0 {
            return (f64::NAN, false);
        }

        let mean1 = group_values.iter().sum::<f64>() / n1;
        let mean2 = reference_values.iter().sum::<f64>() / n2;

        let var1 = group_values
            .iter()
            .map(|x| (x - mean1).powi(2))
            .sum::<f64>()
            / (n1 - 1.0);
        let var2 = reference_values
            .iter()
            .map(|x| (x - mean2).powi(2))
            .sum::<f64>()
            / (n2 - 1.0);

        let se = (var1 / n1 + var2 / n2).sqrt();
        if se == 0.0 {
            return (1.0, false); // No variance difference
        }

        let t = (mean1 - mean2) / se;

        // Welch-Satterthwaite degrees of freedom
        let df_num = (var1 / n1 + var2 / n2).powi(2);
        let df_denom = (var1 / n1).powi(2) / (n1 - 1.0) + (var2 / n2).powi(2) / (n2 - 1.0);
        let df = df_num / df_denom;

        // Two-tailed p-value using t-distribution
        if let Ok(dist) = StudentsT::new(0.0, 1.0, df) {
            let p_value = 2.0 * (1.0 - dist.cdf(t.abs()));
            let is_significant = p_value <= SIGNIFICANCE_THRESHOLD;
            (p_value, is_significant)
        } else {
            (f64::NAN, false)
        }
    }

    /// Compute statistics for all groups of one metric. The reference group is
    /// the first group in sorted order.
    pub fn compute_metric_stats(metric: &str, groups: &BTreeMap<String, Vec<f64>>) -> MetricStats {
        let reference_group = groups.keys().next().cloned().unwrap_or_default();
        let mut group_stats: BTreeMap<String, GroupStats> = BTreeMap::new();

        let reference_values = groups.get(&reference_group).cloned().unwrap_or_default();
        let mut reference_stats = Self::compute_descriptive_stats(&reference_values);
        reference_stats.group_name = reference_group.clone();
        let reference_std = reference_stats.std;
        let reference_mean = reference_stats.mean;
        if !groups.is_empty() {
            group_stats.insert(reference_group.clone(), reference_stats);
        }

        for (group_name, values) in groups {
            if group_name == &reference_group {
                continue;
            }

            let mut gs = Self::compute_descriptive_stats(values);
            gs.group_name = group_name.clone();

            // Calculate standardized mean difference
            if reference_std > 0.0 && !reference_mean.is_nan() {
                gs.std_diff_from_reference = Some((gs.mean - reference_mean) / reference_std);
            }

            if !reference_values.is_empty() {
                let (p_value, is_significant) = Self::perform_ttest(values, &reference_values);
                gs.p_value = Some(p_value);
                gs.is_significant = is_significant;
            }

            group_stats.insert(group_name.clone(), gs);
        }

        MetricStats {
            metric: metric.to_string(),
            reference_group,
            group_stats,
        }
    }

    /// Compute statistics for several metrics in parallel.
    ///
    /// `metrics` pairs a metric name with its per-row values; `labels` holds
    /// the per-row group label.
    pub fn compute_all_stats_parallel(
        metrics: &[(String, Vec<f64>)],
        labels: &[String],
    ) -> Vec<MetricStats> {
        metrics
            .par_iter()
            .map(|(metric, values)| {
                let groups = values_by_group(values, labels);
                Self::compute_metric_stats(metric, &groups)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_descriptive_stats() {
        let stats = StatsCalculator::compute_descriptive_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q1, 1.75);
        assert_eq!(stats.q3, 3.25);
        assert!((stats.variance - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_stats_are_nan() {
        let stats = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [10.0, 20.0, 30.0];
        assert_eq!(StatsCalculator::percentile(&sorted, 50.0), 20.0);
        assert_eq!(StatsCalculator::percentile(&sorted, 25.0), 15.0);
        assert!(StatsCalculator::percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_ttest_detects_separated_groups() {
        let a = [10.0, 11.0, 10.5, 10.2, 10.8];
        let b = [20.0, 21.0, 20.5, 20.2, 20.8];
        let (p, significant) = StatsCalculator::perform_ttest(&a, &b);
        assert!(p < 0.001);
        assert!(significant);

        let (p, significant) = StatsCalculator::perform_ttest(&a, &a);
        assert!(p > 0.99);
        assert!(!significant);
    }

    #[test]
    fn test_parallel_metrics_grouped() {
        let metrics = vec![
            ("FinalGrade".to_string(), vec![10.0, 12.0, 8.0, f64::NAN]),
            ("ImprovabilityScore".to_string(), vec![0.1, 0.3, 0.9, 0.7]),
        ];
        let stats =
            StatsCalculator::compute_all_stats_parallel(&metrics, &labels(&["M", "F", "M", "F"]));
        assert_eq!(stats.len(), 2);

        let grade = &stats[0];
        assert_eq!(grade.metric, "FinalGrade");
        assert_eq!(grade.reference_group, "F");
        assert_eq!(grade.get_ordered_groups(), vec!["F", "M"]);
        assert_eq!(grade.group_stats["F"].count, 1);
        assert_eq!(grade.group_stats["M"].mean, 9.0);
        assert!(!grade.has_significant_results());
    }
}
