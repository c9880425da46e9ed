//! Chart Series Module
//! Groups table values into the point sets and histogram bins the renderer draws.

use std::collections::BTreeMap;

/// Color palette for groups (RGB)
pub const PALETTE: [(u8, u8, u8); 10] = [
    (52, 152, 219),  // Blue
    (231, 76, 60),   // Red
    (46, 204, 113),  // Green
    (155, 89, 182),  // Purple
    (243, 156, 18),  // Orange
    (26, 188, 156),  // Teal
    (233, 30, 99),   // Pink
    (0, 188, 212),   // Cyan
    (121, 85, 72),   // Brown
    (96, 125, 139),  // Blue Grey
];

/// Number of bins used by every histogram.
pub const HISTOGRAM_BINS: usize = 20;

/// Values of the charted table, split by group label.
#[derive(Debug, Clone, Default)]
pub struct ChartData {
    pub group_column: Option<String>,
    /// (FinalGrade, ImprovabilityScore) pairs per group.
    pub points_by_group: BTreeMap<String, Vec<(f64, f64)>>,
}

impl ChartData {
    /// Pair grades with scores per row; rows with a NaN on either side are skipped.
    pub fn new(
        grades: &[f64],
        scores: &[f64],
        labels: &[String],
        group_column: Option<String>,
    ) -> Self {
        let mut points_by_group: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
        for ((g, s), label) in grades.iter().zip(scores).zip(labels) {
            if g.is_nan() || s.is_nan() {
                continue;
            }
            points_by_group.entry(label.clone()).or_default().push((*g, *s));
        }
        Self {
            group_column,
            points_by_group,
        }
    }

    pub fn grades_by_group(&self) -> BTreeMap<String, Vec<f64>> {
        self.project(|(g, _)| g)
    }

    pub fn scores_by_group(&self) -> BTreeMap<String, Vec<f64>> {
        self.project(|(_, s)| s)
    }

    fn project(&self, f: impl Fn((f64, f64)) -> f64) -> BTreeMap<String, Vec<f64>> {
        self.points_by_group
            .iter()
            .map(|(group, points)| (group.clone(), points.iter().copied().map(&f).collect()))
            .collect()
    }

    /// Palette index for a group, stable across all three charts.
    pub fn group_color(&self, group: &str) -> (u8, u8, u8) {
        let idx = self
            .points_by_group
            .keys()
            .position(|g| g == group)
            .unwrap_or(0);
        PALETTE[idx % PALETTE.len()]
    }
}

/// Min and max over every value, padded when the range is degenerate.
pub fn value_range<'a>(groups: impl IntoIterator<Item = &'a Vec<f64>>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in groups.into_iter().flatten() {
        min = min.min(*v);
        max = max.max(*v);
    }
    if min.is_infinite() || max.is_infinite() {
        return (0.0, 1.0);
    }
    if max - min <= 0.0 {
        return (min - 0.5, max + 0.5);
    }
    (min, max)
}

/// Count values into `bins` equal-width bins over [lo, hi]. The last bin is
/// closed so `hi` is counted.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    if bins == 0 || hi <= lo {
        return counts;
    }
    let width = (hi - lo) / bins as f64;
    for &v in values {
        if v < lo || v > hi || v.is_nan() {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}
