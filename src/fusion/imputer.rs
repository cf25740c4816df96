//! Demographic imputation: back-fill Sex and Age_Bin on race-stratified rows.

use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::schema::{
    require_columns, AGE_BIN, IMPUTED_AGE_BIN, LOCATION, SEX, TOPIC, YEAR_END, YEAR_START,
};
use crate::data::StratifiedViews;
use crate::model::{ClassWeight, ForestConfig, ModelSpec, StratifiedClassifier};

use super::FusionError;

/// Columns shared by every view of a survey source.
pub const IMPUTATION_FEATURES: [&str; 4] = [YEAR_START, YEAR_END, LOCATION, TOPIC];

/// Class weighting for the two imputation models of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationPolicy {
    pub sex: ClassWeight,
    pub age: ClassWeight,
}

impl ImputationPolicy {
    pub const NUTRITION: Self = Self {
        sex: ClassWeight::Balanced,
        age: ClassWeight::Balanced,
    };

    // The chronic sex model has always been fitted without class weighting.
    pub const CHRONIC: Self = Self {
        sex: ClassWeight::Uniform,
        age: ClassWeight::Balanced,
    };
}

/// Return the race view of `views` with predicted `Sex` and `Age_Bin` columns.
///
/// The two labels come from independently trained models and are not
/// reconciled with each other.
pub fn impute_demographics(
    source: &str,
    views: &StratifiedViews,
    policy: ImputationPolicy,
    forest: &ForestConfig,
) -> Result<DataFrame, FusionError> {
    info!("{source}: imputing Sex and Age_Bin onto {} race rows", views.race.height());
    for (view, name) in [(&views.sex, "sex"), (&views.age, "age"), (&views.race, "race")] {
        require_columns(view, &format!("{source} {name} view"), &IMPUTATION_FEATURES)?;
    }

    let sex_model = StratifiedClassifier::fit(
        ModelSpec::new(&format!("{source} sex"), &IMPUTATION_FEATURES, SEX, policy.sex),
        &views.sex,
        forest,
    )?;
    let sex = sex_model.predict(&views.race)?;

    let age_model = StratifiedClassifier::fit(
        ModelSpec::new(&format!("{source} age bin"), &IMPUTATION_FEATURES, AGE_BIN, policy.age),
        &views.age,
        forest,
    )?;
    let age_bins = age_model.predict(&views.race)?;

    let mut combined = views.race.clone();
    combined.with_column(Column::new(SEX.into(), sex))?;
    combined.with_column(Column::new(IMPUTED_AGE_BIN.into(), age_bins))?;

    info!("{source}: Sex and Age_Bin assigned to {} rows", combined.height());
    Ok(combined)
}
