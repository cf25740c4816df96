//! Fusion module - demographic imputation, obesity prediction and disease assignment
//!
//! The stages form a chain: each source's race view gains imputed Sex and
//! Age_Bin, nutrition then teaches the chronic rows an obesity flag, and the
//! obesity-positive chronic rows teach the wearable subjects a disease.

mod assigner;
mod imputer;
mod obesity;

pub use assigner::{assign_disease, assignment_gate, DISEASE_FEATURES};
pub use imputer::{impute_demographics, ImputationPolicy, IMPUTATION_FEATURES};
pub use obesity::{label_obesity_topic, predict_obesity, OBESITY_FEATURES, OBESITY_TOPIC};

use log::info;
use polars::prelude::*;
use thiserror::Error;

use crate::config::ModelConfig;
use crate::data::{DataProcessor, ProcessorError, StratifiedViews};
use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Schema(#[from] ProcessorError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Model `{model}` has no training rows")]
    EmptyTrainingSet { model: String },
}

/// The three sources as loaded.
#[derive(Debug, Clone)]
pub struct RawSources {
    pub wearable: DataFrame,
    pub nutrition: DataFrame,
    pub chronic: DataFrame,
}

/// The three sources after cleaning and stratification.
#[derive(Debug, Clone)]
pub struct CleanedSources {
    pub wearable: DataFrame,
    pub nutrition: StratifiedViews,
    pub chronic: StratifiedViews,
}

impl CleanedSources {
    pub fn from_raw(raw: &RawSources) -> Result<Self, FusionError> {
        Ok(Self {
            wearable: DataProcessor::clean_wearable(&raw.wearable)?,
            nutrition: DataProcessor::clean_nutrition(&raw.nutrition)?,
            chronic: DataProcessor::clean_chronic(&raw.chronic)?,
        })
    }
}

/// Every intermediate table the chain produces.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub nutri_combined: DataFrame,
    pub chronic_combined: DataFrame,
    pub chronic_labeled: DataFrame,
    pub final_results: DataFrame,
}

/// Run imputation, obesity prediction and disease assignment in order.
pub fn fuse(sources: &CleanedSources, models: &ModelConfig) -> Result<FusionOutput, FusionError> {
    let nutri_combined = impute_demographics(
        "nutrition",
        &sources.nutrition,
        models.nutrition_imputation,
        &models.forest,
    )?;
    let chronic_combined = impute_demographics(
        "chronic",
        &sources.chronic,
        models.chronic_imputation,
        &models.forest,
    )?;

    info!("Predicting obesity for chronic rows");
    let chronic_labeled = predict_obesity(
        &nutri_combined,
        &chronic_combined,
        models.obesity_weight,
        &models.forest,
    )?;

    info!("Assigning diseases to wearable subjects");
    let final_results = assign_disease(
        &chronic_labeled,
        &sources.wearable,
        models.disease_weight,
        &models.forest,
    )?;

    Ok(FusionOutput {
        nutri_combined,
        chronic_combined,
        chronic_labeled,
        final_results,
    })
}
