//! Stats module - per-group statistics

mod calculator;

pub use calculator::{MetricStats, StatsCalculator, SIGNIFICANCE_THRESHOLD};
