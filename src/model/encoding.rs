//! Feature and label encoding
//!
//! One-hot encoding follows `get_dummies` column layout: numeric feature
//! columns pass through first, in feature order, followed by one indicator
//! column per distinct value of each categorical feature, named
//! `{column}_{value}` with values sorted.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;

use crate::data::schema::{f64_values, is_numeric, string_values};

use super::ModelError;

/// Dense row-major feature matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, n_rows: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), columns.len() * n_rows);
        Self {
            columns,
            values,
            n_rows,
        }
    }

    /// One-hot encode `features` of `df`.
    ///
    /// Null categorical values produce all-zero indicators, null numeric
    /// values become NaN.
    pub fn one_hot(df: &DataFrame, features: &[String]) -> Result<Self, ModelError> {
        let n_rows = df.height();
        let mut numeric: Vec<(String, Vec<f64>)> = Vec::new();
        let mut dummies: Vec<(String, Vec<f64>)> = Vec::new();

        for feature in features {
            let column = df.column(feature)?;
            if is_numeric(column.dtype()) {
                let values = f64_values(df, feature)?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                numeric.push((feature.clone(), values));
                continue;
            }

            let values = string_values(df, feature)?;
            let levels: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
            for level in levels {
                let indicator = values
                    .iter()
                    .map(|v| if v.as_deref() == Some(level) { 1.0 } else { 0.0 })
                    .collect();
                dummies.push((format!("{feature}_{level}"), indicator));
            }
        }

        let encoded: Vec<(String, Vec<f64>)> = numeric.into_iter().chain(dummies).collect();
        let columns: Vec<String> = encoded.iter().map(|(name, _)| name.clone()).collect();
        let mut values = Vec::with_capacity(n_rows * columns.len());
        for row in 0..n_rows {
            values.extend(encoded.iter().map(|(_, col)| col[row]));
        }

        Ok(Self::new(columns, n_rows, values))
    }

    /// Align this matrix to `columns`: keep their order, drop columns not in
    /// the list, zero-fill the ones this matrix lacks.
    pub fn reindex(&self, columns: &[String]) -> Self {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let sources: Vec<Option<usize>> = columns
            .iter()
            .map(|name| positions.get(name.as_str()).copied())
            .collect();

        let mut values = Vec::with_capacity(self.n_rows * columns.len());
        for row in 0..self.n_rows {
            let source_row = self.row(row);
            values.extend(sources.iter().map(|src| src.map_or(0.0, |j| source_row[j])));
        }

        Self::new(columns.to_vec(), self.n_rows, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.columns.len();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.values[row * self.columns.len() + feature]
    }
}

/// Maps string labels to dense class indices, sorted lexically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Self {
        let classes: BTreeSet<&String> = labels.iter().collect();
        Self {
            classes: classes.into_iter().cloned().collect(),
        }
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>, ModelError> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map_err(|_| ModelError::UnknownLabel(label.clone()))
            })
            .collect()
    }

    pub fn inverse_transform(&self, indices: &[usize]) -> Result<Vec<String>, ModelError> {
        indices
            .iter()
            .map(|&i| {
                self.classes
                    .get(i)
                    .cloned()
                    .ok_or(ModelError::UnknownClassIndex(i))
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn column(x: &FeatureMatrix, name: &str) -> Option<Vec<f64>> {
        let j = x.columns().iter().position(|c| c == name)?;
        Some((0..x.n_rows()).map(|i| x.value(i, j)).collect())
    }

    #[test]
    fn one_hot_puts_numeric_first_then_sorted_dummies() {
        let df = df!(
            "LocationDesc" => &["Texas", "Ohio", "Texas"],
            "YearStart" => &[2019i64, 2020, 2021],
            "Topic" => &["Asthma", "Asthma", "Cancer"],
        )
        .unwrap();

        let x = FeatureMatrix::one_hot(&df, &names(&["LocationDesc", "YearStart", "Topic"])).unwrap();

        assert_eq!(
            x.columns(),
            names(&[
                "YearStart",
                "LocationDesc_Ohio",
                "LocationDesc_Texas",
                "Topic_Asthma",
                "Topic_Cancer",
            ])
        );
        assert_eq!(x.row(0), &[2019.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(x.row(1), &[2020.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(x.row(2), &[2021.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn null_category_encodes_as_all_zero() {
        let df = df!("Sex" => &[Some("Male"), None]).unwrap();
        let x = FeatureMatrix::one_hot(&df, &names(&["Sex"])).unwrap();

        assert_eq!(x.columns(), names(&["Sex_Male"]));
        assert_eq!(x.row(1), &[0.0]);
    }

    #[test]
    fn reindex_drops_unseen_and_zero_fills_missing() {
        let train = names(&["YearStart", "LocationDesc_Ohio", "LocationDesc_Texas"]);
        let inference = FeatureMatrix::new(
            names(&["YearStart", "LocationDesc_Texas", "LocationDesc_Utah"]),
            2,
            vec![2019.0, 1.0, 0.0, 2020.0, 0.0, 1.0],
        );

        let aligned = inference.reindex(&train);

        assert_eq!(aligned.columns(), train.as_slice());
        assert!(column(&aligned, "LocationDesc_Utah").is_none());
        assert_eq!(column(&aligned, "LocationDesc_Ohio").unwrap(), vec![0.0, 0.0]);
        assert_eq!(aligned.row(0), &[2019.0, 0.0, 1.0]);
        assert_eq!(aligned.row(1), &[2020.0, 0.0, 0.0]);
    }

    #[test]
    fn label_encoder_round_trips_sorted_classes() {
        let labels = names(&["Male", "Female", "Male"]);
        let encoder = LabelEncoder::fit(&labels);

        assert_eq!(encoder.classes(), names(&["Female", "Male"]));
        let encoded = encoder.transform(&labels).unwrap();
        assert_eq!(encoded, vec![1, 0, 1]);
        assert_eq!(encoder.inverse_transform(&encoded).unwrap(), labels);
    }

    #[test]
    fn label_encoder_rejects_unknown_values() {
        let encoder = LabelEncoder::fit(&names(&["18-44", "45-64"]));

        assert!(matches!(
            encoder.transform(&names(&["65+"])),
            Err(ModelError::UnknownLabel(label)) if label == "65+"
        ));
        assert!(matches!(
            encoder.inverse_transform(&[2]),
            Err(ModelError::UnknownClassIndex(2))
        ));
    }
}
