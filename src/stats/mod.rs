//! Stats module - descriptive summaries for the analysis charts

mod calculator;

pub use calculator::{BoxStats, CrossTab, StatsCalculator};
