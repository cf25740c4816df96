//! Chart Plotter Module
//! Chart descriptions built by the analysis stage and handed to the renderer.

use plotters::style::RGBColor;
use std::collections::HashMap;

use crate::stats::{BoxStats, CrossTab};

/// Color palette for series
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

pub fn series_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// One named set of bar heights, one per category.
///
/// Series sharing a `slot` stack on top of each other in series order;
/// distinct slots sit side by side within a category.
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub name: String,
    pub slot: usize,
    pub values: Vec<f64>,
}

/// Categorical bar chart: single, grouped, stacked or grouped-and-stacked.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub legend_title: Option<String>,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
}

impl BarChart {
    /// One bar per category.
    pub fn single(title: &str, x_label: &str, counts: &[(String, usize)]) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: "Count".to_string(),
            legend_title: None,
            categories: counts.iter().map(|(label, _)| label.clone()).collect(),
            series: vec![BarSeries {
                name: "Count".to_string(),
                slot: 0,
                values: counts.iter().map(|&(_, n)| n as f64).collect(),
            }],
        }
    }

    /// Side-by-side bars per category, one per cross-tab column.
    pub fn grouped(title: &str, x_label: &str, legend_title: &str, table: &CrossTab) -> Self {
        let series = table
            .columns
            .iter()
            .enumerate()
            .map(|(slot, column)| BarSeries {
                name: column.clone(),
                slot,
                values: table
                    .column_counts(column)
                    .into_iter()
                    .map(|n| n as f64)
                    .collect(),
            })
            .collect();

        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: "Count".to_string(),
            legend_title: Some(legend_title.to_string()),
            categories: table.rows.clone(),
            series,
        }
    }

    pub fn n_slots(&self) -> usize {
        self.series.iter().map(|s| s.slot + 1).max().unwrap_or(1)
    }

    /// Tallest stack over every (slot, category).
    pub fn max_height(&self) -> f64 {
        let mut heights: HashMap<(usize, usize), f64> = HashMap::new();
        for series in &self.series {
            for (category, value) in series.values.iter().enumerate() {
                *heights.entry((series.slot, category)).or_default() += value;
            }
        }
        heights.values().copied().fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() || self.series.is_empty()
    }
}

/// Box plot of values by group, split by hue within each group.
#[derive(Debug, Clone)]
pub struct BoxChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub groups: Vec<String>,
    pub hues: Vec<String>,
    pub stats: HashMap<(String, String), BoxStats>,
}

impl BoxChart {
    /// Value range covered by the whiskers of every box.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let (low, high) = self
            .stats
            .values()
            .filter(|s| s.count > 0)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.whisker_low), hi.max(s.whisker_high))
            });
        (low.is_finite() && high.is_finite()).then_some((low, high))
    }
}
