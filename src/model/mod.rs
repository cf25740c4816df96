//! Model module - encoding, random forest and the stratified classifier contract

mod classifier;
mod encoding;
mod forest;

pub use classifier::{ModelSpec, StratifiedClassifier};
pub use encoding::{FeatureMatrix, LabelEncoder};
pub use forest::{ClassWeight, DecisionTree, ForestConfig, MaxFeatures, RandomForest};

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::data::ProcessorError;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Schema(#[from] ProcessorError),
    #[error("Model `{model}` has no labeled training rows")]
    NoTrainingRows { model: String },
    #[error("Cannot fit a forest on an empty training set")]
    EmptyTrainingSet,
    #[error("Feature matrix has {rows} rows but {labels} labels were given")]
    ShapeMismatch { rows: usize, labels: usize },
    #[error("Label `{0}` was not seen during training")]
    UnknownLabel(String),
    #[error("Class index {0} is out of range")]
    UnknownClassIndex(usize),
}
