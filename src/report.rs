//! Score Report Module
//! Summary of one scoring run, printed as a text table or JSON.

use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

use crate::data::FilterState;
use crate::score::ScoreMethod;
use crate::session::{DashboardView, Session};
use crate::stats::{MetricStats, SIGNIFICANCE_THRESHOLD};

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub data_dir: Option<PathBuf>,
    pub method: ScoreMethod,
    pub features: Vec<String>,
    pub filters: FilterState,
    pub group_column: Option<String>,
    pub rows_loaded: usize,
    pub rows_scored: usize,
    pub rows_shown: usize,
    pub charts: Vec<PathBuf>,
    pub metrics: Vec<MetricStats>,
}

impl ScoreReport {
    pub fn new(session: &Session, view: &DashboardView, filters: &FilterState) -> Self {
        Self {
            data_dir: session.table().source_dir().map(|p| p.to_path_buf()),
            method: session.method(),
            features: session.features().to_vec(),
            filters: filters.clone(),
            group_column: view.group_column.clone(),
            rows_loaded: session.table().height(),
            rows_scored: session.scored().map_or(0, |t| t.height()),
            rows_shown: view.table.height(),
            charts: Vec::new(),
            metrics: view.stats.clone(),
        }
    }

    pub fn with_charts(mut self, charts: Vec<PathBuf>) -> Self {
        self.charts = charts;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(dir) = &self.data_dir {
            let _ = writeln!(out, "Data:      {}", dir.display());
        }
        let method = match self.method {
            ScoreMethod::MinMax => "minmax",
            ScoreMethod::Pca => "pca",
        };
        let _ = writeln!(out, "Method:    {method}");
        let _ = writeln!(out, "Features:  {}", self.features.join(", "));
        for (column, values) in &self.filters {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            let _ = writeln!(out, "Filter:    {column} in [{}]", values.join(", "));
        }
        let _ = writeln!(
            out,
            "Rows:      {} loaded, {} scored, {} shown",
            self.rows_loaded, self.rows_scored, self.rows_shown
        );
        for path in &self.charts {
            let _ = writeln!(out, "Chart:     {}", path.display());
        }

        for metric in &self.metrics {
            out.push('\n');
            render_metric(&mut out, metric, self.group_column.as_deref());
        }
        out
    }
}

fn render_metric(out: &mut String, metric: &MetricStats, group_column: Option<&str>) {
    match group_column {
        Some(col) => {
            let _ = writeln!(
                out,
                "{} by {} (reference: {})",
                metric.metric, col, metric.reference_group
            );
        }
        None => {
            let _ = writeln!(out, "{}", metric.metric);
        }
    }
    let _ = writeln!(
        out,
        "{:<12} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Group", "N", "Mean", "Median", "Std", "Q1", "Q3", "P05", "P95", "(G-R)/sd"
    );
    for group in metric.get_ordered_groups() {
        let Some(gs) = metric.group_stats.get(&group) else {
            continue;
        };
        let diff = gs
            .std_diff_from_reference
            .map_or_else(|| "-".to_string(), |d| format!("{d:.3}"));
        let _ = write!(
            out,
            "{:<12} {:>5} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9}",
            gs.group_name, gs.count, gs.mean, gs.median, gs.std, gs.q1, gs.q3, gs.p05, gs.p95, diff
        );
        if let Some(p) = gs.p_value {
            let mark = if gs.is_significant { " *" } else { "" };
            let _ = write!(out, "  p={p:.4}{mark}");
        }
        out.push('\n');
    }
    if metric.has_significant_results() {
        let _ = writeln!(out, "* p <= {SIGNIFICANCE_THRESHOLD}");
    }
}
