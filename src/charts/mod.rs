//! Charts module - Chart data preparation and PNG rendering

mod renderer;
mod series;

pub use renderer::{StaticChartRenderer, SCATTER_FILE};
pub use series::ChartData;
