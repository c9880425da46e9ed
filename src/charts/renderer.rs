//! Static Chart Renderer
//! Writes the three dashboard charts as PNG images.
//!
//! 1. FinalGrade x ImprovabilityScore scatter, FinalGrade axis reversed
//! 2. FinalGrade histogram, one translucent series per group
//! 3. ImprovabilityScore histogram, one translucent series per group

use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::series::{histogram, value_range, ChartData, HISTOGRAM_BINS};
use crate::score::SCORE_COLUMN;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 650;

pub const SCATTER_FILE: &str = "final_grade_vs_score.png";
pub const GRADE_HISTOGRAM_FILE: &str = "final_grade_histogram.png";
pub const SCORE_HISTOGRAM_FILE: &str = "score_histogram.png";

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to create chart directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to draw {chart}: {message}")]
    Draw { chart: String, message: String },
}

fn draw_err<E: std::fmt::Display>(chart: &str) -> impl FnOnce(E) -> ChartError + '_ {
    move |e| ChartError::Draw {
        chart: chart.to_string(),
        message: e.to_string(),
    }
}

/// Tick label for the negated grade axis.
fn grade_tick_label(x: &f64) -> String {
    format!("{:.1}", -x)
}

fn rgb((r, g, b): (u8, u8, u8)) -> RGBColor {
    RGBColor(r, g, b)
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render all three charts into `dir`, returning the written paths.
    pub fn render_all(
        data: &ChartData,
        grade_column: &str,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ChartError> {
        std::fs::create_dir_all(dir).map_err(|source| ChartError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let by = data
            .group_column
            .as_deref()
            .map(|c| format!(" by {c}"))
            .unwrap_or_default();

        let scatter = dir.join(SCATTER_FILE);
        Self::draw_scatter(
            data,
            &scatter,
            &format!("{grade_column} x {SCORE_COLUMN}"),
            grade_column,
        )?;

        let grade_hist = dir.join(GRADE_HISTOGRAM_FILE);
        Self::draw_histogram(
            data,
            &data.grades_by_group(),
            &grade_hist,
            &format!("{grade_column} distribution{by}"),
            grade_column,
        )?;

        let score_hist = dir.join(SCORE_HISTOGRAM_FILE);
        Self::draw_histogram(
            data,
            &data.scores_by_group(),
            &score_hist,
            &format!("{SCORE_COLUMN} distribution{by}"),
            SCORE_COLUMN,
        )?;

        let written = vec![scatter, grade_hist, score_hist];
        info!("Wrote {} charts to {:?}", written.len(), dir);
        Ok(written)
    }

    /// Scatter of grade against score. The grade axis runs high to low, so
    /// x is plotted negated and relabelled.
    fn draw_scatter(
        data: &ChartData,
        path: &Path,
        title: &str,
        grade_column: &str,
    ) -> Result<(), ChartError> {
        let grades = data.grades_by_group();
        let scores = data.scores_by_group();
        let (g_min, g_max) = value_range(grades.values());
        let (s_min, s_max) = value_range(scores.values());
        let s_pad = (s_max - s_min) * 0.05;

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err(title))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(-g_max..-g_min, (s_min - s_pad)..(s_max + s_pad))
            .map_err(draw_err(title))?;

        chart
            .configure_mesh()
            .x_desc(grade_column)
            .y_desc(SCORE_COLUMN)
            .x_label_formatter(&grade_tick_label)
            .draw()
            .map_err(draw_err(title))?;

        for (group, points) in &data.points_by_group {
            let color = rgb(data.group_color(group));
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(g, s)| Circle::new((-g, s), 4, color.mix(0.8).filled())),
                )
                .map_err(draw_err(title))?
                .label(group.as_str())
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        }

        Self::draw_legend(&mut chart, data).map_err(draw_err(title))?;
        root.present().map_err(draw_err(title))?;
        Ok(())
    }

    /// Overlaid per-group histograms sharing one set of bins.
    fn draw_histogram(
        data: &ChartData,
        values_by_group: &BTreeMap<String, Vec<f64>>,
        path: &Path,
        title: &str,
        x_desc: &str,
    ) -> Result<(), ChartError> {
        let (lo, hi) = value_range(values_by_group.values());
        let bin_width = (hi - lo) / HISTOGRAM_BINS as f64;
        let counts: BTreeMap<&String, Vec<usize>> = values_by_group
            .iter()
            .map(|(group, values)| (group, histogram(values, lo, hi, HISTOGRAM_BINS)))
            .collect();
        let max_count = counts
            .values()
            .flat_map(|c| c.iter().copied())
            .max()
            .unwrap_or(0)
            .max(1);

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err(title))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(lo..hi, 0f64..(max_count as f64 * 1.1))
            .map_err(draw_err(title))?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc("count")
            .draw()
            .map_err(draw_err(title))?;

        for (group, bins) in &counts {
            let color = rgb(data.group_color(group));
            chart
                .draw_series(
                    bins.iter()
                        .enumerate()
                        .filter(|(_, c)| **c > 0)
                        .map(|(i, &c)| {
                            let x0 = lo + i as f64 * bin_width;
                            Rectangle::new(
                                [(x0, 0.0), (x0 + bin_width, c as f64)],
                                color.mix(0.45).filled(),
                            )
                        }),
                )
                .map_err(draw_err(title))?
                .label(group.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled())
                });
        }

        Self::draw_legend(&mut chart, data).map_err(draw_err(title))?;
        root.present().map_err(draw_err(title))?;
        Ok(())
    }

    fn draw_legend<'a, DB: DrawingBackend + 'a>(
        chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
        data: &ChartData,
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        if data.group_column.is_none() {
            return Ok(());
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
    }
}
