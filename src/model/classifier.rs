//! Train on one stratified view, predict onto another.
//!
//! All four models in the pipeline go through this contract: validate the
//! input columns, one-hot encode the features, label-encode the target, fit
//! a forest, then encode the inference view, reindex it onto the training
//! columns and decode the predicted classes back to labels.

use log::{debug, info, warn};
use polars::prelude::*;

use crate::data::schema::{require_columns, string_values};

use super::encoding::{FeatureMatrix, LabelEncoder};
use super::forest::{ClassWeight, ForestConfig, RandomForest};
use super::ModelError;

/// What a classifier learns: feature columns, target column and weighting.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub features: Vec<String>,
    pub target: String,
    pub class_weight: ClassWeight,
}

impl ModelSpec {
    pub fn new(name: &str, features: &[&str], target: &str, class_weight: ClassWeight) -> Self {
        Self {
            name: name.to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
            target: target.to_string(),
            class_weight,
        }
    }

    fn required_training_columns(&self) -> Vec<&str> {
        self.features
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.target.as_str()))
            .collect()
    }

    fn feature_columns(&self) -> Vec<&str> {
        self.features.iter().map(String::as_str).collect()
    }
}

/// A fitted model plus everything needed to encode new rows the same way.
#[derive(Debug, Clone)]
pub struct StratifiedClassifier {
    spec: ModelSpec,
    columns: Vec<String>,
    labels: LabelEncoder,
    forest: RandomForest,
}

impl StratifiedClassifier {
    /// Fit `spec` on `train`. Rows with a null target are skipped.
    pub fn fit(spec: ModelSpec, train: &DataFrame, config: &ForestConfig) -> Result<Self, ModelError> {
        require_columns(train, &spec.name, &spec.required_training_columns())?;

        let targets = string_values(train, &spec.target)?;
        let labeled: Vec<bool> = targets.iter().map(Option::is_some).collect();
        let skipped = labeled.iter().filter(|&&keep| !keep).count();
        let train = if skipped > 0 {
            warn!(
                "{}: skipping {skipped} training rows with no `{}` label",
                spec.name, spec.target
            );
            train.filter(&BooleanChunked::from_slice("labeled".into(), &labeled))?
        } else {
            train.clone()
        };
        let targets: Vec<String> = targets.into_iter().flatten().collect();
        if targets.is_empty() {
            return Err(ModelError::NoTrainingRows { model: spec.name });
        }

        let x = FeatureMatrix::one_hot(&train, &spec.features)?;
        let labels = LabelEncoder::fit(&targets);
        let y = labels.transform(&targets)?;

        info!(
            "{}: training on {} rows, {} encoded features, {} classes ({:?} weighting)",
            spec.name,
            x.n_rows(),
            x.n_features(),
            labels.n_classes(),
            spec.class_weight
        );
        let forest = RandomForest::fit(&x, &y, labels.n_classes(), spec.class_weight, config)?;

        Ok(Self {
            columns: x.columns().to_vec(),
            spec,
            labels,
            forest,
        })
    }

    /// Predict labels for every row of `target`.
    pub fn predict(&self, target: &DataFrame) -> Result<Vec<String>, ModelError> {
        require_columns(target, &self.spec.name, &self.spec.feature_columns())?;

        let encoded = FeatureMatrix::one_hot(target, &self.spec.features)?;
        let unseen = encoded
            .columns()
            .iter()
            .filter(|c| !self.columns.contains(c))
            .count();
        if unseen > 0 {
            debug!(
                "{}: dropping {unseen} encoded columns unseen during training",
                self.spec.name
            );
        }

        let aligned = encoded.reindex(&self.columns);
        let predictions = self.forest.predict(&aligned);
        self.labels.inverse_transform(&predictions)
    }

    /// Labels seen during training, sorted.
    pub fn classes(&self) -> &[String] {
        self.labels.classes()
    }

    /// Encoded training column order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProcessorError;

    fn sex_view() -> DataFrame {
        df!(
            "YearStart" => &[2015i64, 2015, 2016, 2016],
            "LocationDesc" => &["LocationA", "LocationB", "LocationA", "LocationB"],
            "Topic" => &["Health Status", "Immunization", "Health Status", "Immunization"],
            "Sex" => &["Female", "Male", "Female", "Male"],
        )
        .unwrap()
    }

    fn spec() -> ModelSpec {
        ModelSpec::new(
            "sex",
            &["YearStart", "LocationDesc", "Topic"],
            "Sex",
            ClassWeight::Balanced,
        )
    }

    #[test]
    fn predictions_only_use_training_labels() {
        let model = StratifiedClassifier::fit(spec(), &sex_view(), &ForestConfig::default()).unwrap();
        let race_view = df!(
            "YearStart" => &[2015i64, 2017, 2015],
            "LocationDesc" => &["LocationA", "LocationC", "LocationB"],
            "Topic" => &["Health Status", "Asthma", "Immunization"],
            "Race/Ethnicity" => &["Hispanic", "Asian", "White"],
        )
        .unwrap();

        let predicted = model.predict(&race_view).unwrap();

        assert_eq!(predicted.len(), 3);
        for label in &predicted {
            assert!(model.classes().contains(label), "novel label {label}");
        }
        assert_eq!(predicted[0], "Female");
        assert_eq!(predicted[2], "Male");
    }

    #[test]
    fn training_columns_are_kept_for_inference() {
        let model = StratifiedClassifier::fit(spec(), &sex_view(), &ForestConfig::default()).unwrap();
        assert_eq!(
            model.columns(),
            &[
                "YearStart".to_string(),
                "LocationDesc_LocationA".to_string(),
                "LocationDesc_LocationB".to_string(),
                "Topic_Health Status".to_string(),
                "Topic_Immunization".to_string(),
            ]
        );
    }

    #[test]
    fn missing_feature_column_is_reported() {
        let view = sex_view().drop("Topic").unwrap();
        let err = StratifiedClassifier::fit(spec(), &view, &ForestConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Schema(ProcessorError::MissingColumn { ref column, .. }) if column == "Topic"
        ));

        let model = StratifiedClassifier::fit(spec(), &sex_view(), &ForestConfig::default()).unwrap();
        let err = model
            .predict(&df!("YearStart" => &[2015i64], "Topic" => &["Asthma"]).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("LocationDesc"));
    }

    #[test]
    fn null_targets_are_skipped() {
        let view = df!(
            "YearStart" => &[2015i64, 2016, 2017],
            "LocationDesc" => &["LocationA", "LocationA", "LocationB"],
            "Topic" => &["Alcohol", "Alcohol", "Cancer"],
            "Sex" => &[Some("Female"), None, Some("Male")],
        )
        .unwrap();

        let model = StratifiedClassifier::fit(spec(), &view, &ForestConfig::default()).unwrap();
        assert_eq!(model.classes(), &["Female".to_string(), "Male".to_string()]);
    }

    #[test]
    fn all_null_targets_is_an_error() {
        let view = df!(
            "YearStart" => &[2015i64],
            "LocationDesc" => &["LocationA"],
            "Topic" => &["Alcohol"],
            "Sex" => &[None::<&str>],
        )
        .unwrap();

        let err = StratifiedClassifier::fit(spec(), &view, &ForestConfig::default()).unwrap_err();
        assert!(matches!(err, ModelError::NoTrainingRows { ref model } if model == "sex"));
    }
}
