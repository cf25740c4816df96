//! Charts module - Chart descriptions and PNG rendering

mod plotter;
mod renderer;

pub use plotter::{series_color, BarChart, BarSeries, BoxChart, PALETTE};
pub use renderer::{ChartError, StaticChartRenderer};
