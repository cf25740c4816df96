//! Statistics Calculator Module
//! Handles counting, cross tabulation and box-plot summaries for the result charts.

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

use crate::data::schema::{f64_values, string_values};

/// Whisker reach in multiples of the inter-quartile range.
pub const WHISKER_IQR: f64 = 1.5;

/// Box-plot summary for one group of values.
#[derive(Debug, Clone, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
}

impl Default for BoxStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            whisker_low: f64::NAN,
            whisker_high: f64::NAN,
        }
    }
}

/// Counts of row label × column label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrossTab {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `counts[row][column]`
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    pub fn get(&self, row: &str, column: &str) -> usize {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.columns.iter().position(|x| x == column);
        match (r, c) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Counts for one column across all rows.
    pub fn column_counts(&self, column: &str) -> Vec<usize> {
        match self.columns.iter().position(|x| x == column) {
            Some(c) => self.counts.iter().map(|row| row[c]).collect(),
            None => vec![0; self.rows.len()],
        }
    }
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute the box-plot summary for an array of values. NaNs are ignored.
    pub fn compute_box_stats(values: &[f64]) -> BoxStats {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let n = sorted.len();
        if n == 0 {
            return BoxStats::default();
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = Self::percentile(&sorted, 25.0);
        let median = Self::percentile(&sorted, 50.0);
        let q3 = Self::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let low_fence = q1 - WHISKER_IQR * iqr;
        let high_fence = q3 + WHISKER_IQR * iqr;

        // Whiskers extend to the most extreme observations inside the fences.
        let whisker_low = sorted
            .iter()
            .copied()
            .find(|&v| v >= low_fence)
            .unwrap_or(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= high_fence)
            .unwrap_or(q3);

        let std = if n > 1 { sorted.iter().std_dev() } else { 0.0 };

        BoxStats {
            count: n,
            mean: sorted.iter().mean(),
            std,
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
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

    /// Counts of each non-null value of a column, most frequent first
    /// (ties broken by label).
    pub fn value_counts(df: &DataFrame, column: &str) -> PolarsResult<Vec<(String, usize)>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in string_values(df, column)?.into_iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    /// Counts of each non-null value of a column, sorted by label.
    pub fn value_counts_by_label(df: &DataFrame, column: &str) -> PolarsResult<Vec<(String, usize)>> {
        let mut counts = Self::value_counts(df, column)?;
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(counts)
    }

    /// Cross tabulation of two columns; rows where either side is null are skipped.
    /// Row and column labels are sorted.
    pub fn crosstab(df: &DataFrame, row: &str, column: &str) -> PolarsResult<CrossTab> {
        let row_values = string_values(df, row)?;
        let column_values = string_values(df, column)?;

        let mut cells: BTreeMap<(String, String), usize> = BTreeMap::new();
        for (r, c) in row_values.into_iter().zip(column_values) {
            if let (Some(r), Some(c)) = (r, c) {
                *cells.entry((r, c)).or_default() += 1;
            }
        }

        let rows: Vec<String> = cells
            .keys()
            .map(|(r, _)| r.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<String> = cells
            .keys()
            .map(|(_, c)| c.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let counts = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Ok(CrossTab {
            rows,
            columns,
            counts,
        })
    }

    /// Values of `value_column` grouped by the pair (`group`, `hue`).
    pub fn grouped_values(
        df: &DataFrame,
        group: &str,
        hue: &str,
        value_column: &str,
    ) -> PolarsResult<HashMap<(String, String), Vec<f64>>> {
        let groups = string_values(df, group)?;
        let hues = string_values(df, hue)?;
        let values = f64_values(df, value_column)?;

        let mut grouped: HashMap<(String, String), Vec<f64>> = HashMap::new();
        for ((g, h), v) in groups.into_iter().zip(hues).zip(values) {
            if let (Some(g), Some(h), Some(v)) = (g, h, v) {
                grouped.entry((g, h)).or_default().push(v);
            }
        }
        Ok(grouped)
    }

    /// Compute box statistics for every (group, hue) pair in parallel.
    pub fn compute_grouped_box_stats_parallel(
        grouped: &HashMap<(String, String), Vec<f64>>,
    ) -> HashMap<(String, String), BoxStats> {
        grouped
            .par_iter()
            .map(|(key, values)| (key.clone(), Self::compute_box_stats(values)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_numpy_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(StatsCalculator::percentile(&sorted, 50.0), 2.5);
        assert_eq!(StatsCalculator::percentile(&sorted, 25.0), 1.75);
        assert_eq!(StatsCalculator::percentile(&sorted, 100.0), 4.0);
    }

    #[test]
    fn box_stats_clip_whiskers_to_fences() {
        let stats = StatsCalculator::compute_box_stats(&[20.0, 21.0, 22.0, 23.0, 24.0, 60.0]);

        assert_eq!(stats.count, 6);
        assert_eq!(stats.median, 22.5);
        assert_eq!(stats.whisker_low, 20.0);
        assert_eq!(stats.whisker_high, 24.0);
        assert!((stats.mean - 28.333_333).abs() < 1e-5);
    }

    #[test]
    fn empty_box_stats_are_nan() {
        let stats = StatsCalculator::compute_box_stats(&[f64::NAN]);
        assert_eq!(stats.count, 0);
        assert!(stats.median.is_nan());
    }

    #[test]
    fn value_counts_skip_nulls_and_sort_by_frequency() {
        let df = df!("Assigned_Disease" => &[Some("Heart"), None, Some("NPW"), Some("NPW")]).unwrap();
        let counts = StatsCalculator::value_counts(&df, "Assigned_Disease").unwrap();
        assert_eq!(
            counts,
            vec![("NPW".to_string(), 2), ("Heart".to_string(), 1)]
        );
    }

    #[test]
    fn crosstab_counts_pairs() {
        let df = df!(
            "Assigned_Disease" => &[Some("Heart"), Some("Heart"), Some("NPW"), None],
            "Sex" => &["Female", "Male", "Female", "Female"],
        )
        .unwrap();

        let table = StatsCalculator::crosstab(&df, "Assigned_Disease", "Sex").unwrap();

        assert_eq!(table.rows, vec!["Heart".to_string(), "NPW".to_string()]);
        assert_eq!(table.columns, vec!["Female".to_string(), "Male".to_string()]);
        assert_eq!(table.get("Heart", "Male"), 1);
        assert_eq!(table.get("NPW", "Male"), 0);
        assert_eq!(table.column_counts("Female"), vec![1, 1]);
    }

    #[test]
    fn grouped_values_pair_group_and_hue() {
        let df = df!(
            "Sex" => &["Female", "Female", "Male"],
            "Age_Bin" => &["18-44", "18-44", "65+"],
            "BMI" => &[22.0, 24.0, 30.0],
        )
        .unwrap();

        let grouped = StatsCalculator::grouped_values(&df, "Sex", "Age_Bin", "BMI").unwrap();
        let stats = StatsCalculator::compute_grouped_box_stats_parallel(&grouped);

        assert_eq!(grouped[&("Female".to_string(), "18-44".to_string())], vec![22.0, 24.0]);
        assert_eq!(stats[&("Male".to_string(), "65+".to_string())].count, 1);
    }
}
