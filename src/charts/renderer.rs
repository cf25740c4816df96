//! Static Chart Renderer
//! Draws bar and box charts to PNG files with the plotters bitmap backend.
//!
//! Categories sit at integer x positions; each category is split into
//! `n_slots` side-by-side bars (or boxes) across 80% of the unit width.

use plotters::prelude::*;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::plotter::{series_color, BarChart, BoxChart};

pub const DEFAULT_SIZE: (u32, u32) = (1200, 800);

/// Share of a category's unit width covered by bars.
const CATEGORY_WIDTH: f64 = 0.8;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },
    #[error("Nothing to plot for {0}")]
    Empty(String),
}

type DrawResult = Result<(), Box<dyn StdError>>;

/// Horizontal extent of `slot` within `category`.
fn slot_span(category: usize, slot: usize, n_slots: usize) -> (f64, f64) {
    let width = CATEGORY_WIDTH / n_slots.max(1) as f64;
    let left = category as f64 - CATEGORY_WIDTH / 2.0 + slot as f64 * width;
    (left, left + width)
}

/// Enough x ticks for a half-unit step, so every category center gets one.
fn tick_count(n_categories: usize) -> usize {
    2 * n_categories + 1
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    pub fn render_bar_chart(chart: &BarChart, path: &Path) -> Result<(), ChartError> {
        if chart.is_empty() {
            return Err(ChartError::Empty(chart.title.clone()));
        }
        Self::draw_bar_chart(chart, path, DEFAULT_SIZE).map_err(|e| ChartError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn render_box_chart(chart: &BoxChart, path: &Path) -> Result<(), ChartError> {
        let Some(range) = chart.value_range() else {
            return Err(ChartError::Empty(chart.title.clone()));
        };
        Self::draw_box_chart(chart, range, path, DEFAULT_SIZE).map_err(|e| ChartError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn draw_bar_chart(chart: &BarChart, path: &Path, size: (u32, u32)) -> DrawResult {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let n = chart.categories.len();
        let n_slots = chart.n_slots();
        let y_max = (chart.max_height() * 1.1).max(1.0);

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(90)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..n as f64 - 0.5, 0.0..y_max)?;

        let labels = &chart.categories;
        let format_category = |x: &f64| -> String {
            let i = x.round();
            if (x - i).abs() < 1e-6 && i >= 0.0 {
                labels.get(i as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        };
        ctx.configure_mesh()
            .disable_x_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_labels(tick_count(n))
            .x_label_formatter(&format_category)
            .x_label_style(("sans-serif", 13))
            .draw()?;

        // Running top of each (slot, category) stack.
        let mut bottoms = vec![vec![0.0; n]; n_slots];
        for (idx, series) in chart.series.iter().enumerate() {
            let color = series_color(idx);
            let bars: Vec<Rectangle<(f64, f64)>> = series
                .values
                .iter()
                .enumerate()
                .take(n)
                .map(|(category, &value)| {
                    let (x0, x1) = slot_span(category, series.slot, n_slots);
                    let y0 = bottoms[series.slot][category];
                    bottoms[series.slot][category] += value;
                    Rectangle::new([(x0, y0), (x1, y0 + value)], color.filled())
                })
                .collect();

            ctx.draw_series(bars)?
                .label(series.name.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        if chart.series.len() > 1 {
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }

        root.present()?;
        Ok(())
    }

    fn draw_box_chart(chart: &BoxChart, (low, high): (f64, f64), path: &Path, size: (u32, u32)) -> DrawResult {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let n = chart.groups.len();
        let n_slots = chart.hues.len().max(1);
        let pad = ((high - low) * 0.1).max(1.0);

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..n as f64 - 0.5, (low - pad)..(high + pad))?;

        let labels = &chart.groups;
        let format_group = |x: &f64| -> String {
            let i = x.round();
            if (x - i).abs() < 1e-6 && i >= 0.0 {
                labels.get(i as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        };
        ctx.configure_mesh()
            .disable_x_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_labels(tick_count(n))
            .x_label_formatter(&format_group)
            .draw()?;

        for (slot, hue) in chart.hues.iter().enumerate() {
            let color = series_color(slot);
            let boxes: Vec<_> = chart
                .groups
                .iter()
                .enumerate()
                .filter_map(|(g, group)| {
                    let stats = chart.stats.get(&(group.clone(), hue.clone()))?;
                    (stats.count > 0).then_some((slot_span(g, slot, n_slots), stats))
                })
                .collect();

            ctx.draw_series(boxes.iter().map(|&((x0, x1), s)| {
                Rectangle::new([(x0, s.q1), (x1, s.q3)], color.mix(0.5).filled())
            }))?
            .label(hue.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

            ctx.draw_series(boxes.iter().map(|&((x0, x1), s)| {
                Rectangle::new([(x0, s.q1), (x1, s.q3)], color.stroke_width(2))
            }))?;

            let mut lines: Vec<PathElement<(f64, f64)>> = Vec::new();
            for &((x0, x1), s) in &boxes {
                let mid = (x0 + x1) / 2.0;
                let cap = (x1 - x0) / 4.0;
                lines.push(PathElement::new(vec![(x0, s.median), (x1, s.median)], BLACK.stroke_width(2)));
                lines.push(PathElement::new(vec![(mid, s.whisker_low), (mid, s.q1)], BLACK.stroke_width(1)));
                lines.push(PathElement::new(vec![(mid, s.q3), (mid, s.whisker_high)], BLACK.stroke_width(1)));
                lines.push(PathElement::new(
                    vec![(mid - cap, s.whisker_low), (mid + cap, s.whisker_low)],
                    BLACK.stroke_width(1),
                ));
                lines.push(PathElement::new(
                    vec![(mid - cap, s.whisker_high), (mid + cap, s.whisker_high)],
                    BLACK.stroke_width(1),
                ));
            }
            ctx.draw_series(lines)?;
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}
