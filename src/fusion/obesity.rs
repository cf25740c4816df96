//! Obesity classifier: learn the obesity topic from nutrition demographics,
//! predict it onto chronic rows.

use log::info;
use polars::prelude::*;

use crate::data::schema::{IMPUTED_AGE_BIN, LOCATION, OBESITY_BINARY, RACE, SEX, TOPIC};
use crate::model::{ClassWeight, ForestConfig, ModelSpec, StratifiedClassifier};

use super::FusionError;

/// Survey topic treated as the positive class.
pub const OBESITY_TOPIC: &str = "Obesity / Weight Status";

pub const OBESITY_FEATURES: [&str; 4] = [LOCATION, RACE, SEX, IMPUTED_AGE_BIN];

/// Add a 0/1 `Obesity_Binary` column: 1 iff `Topic` is the obesity topic.
pub fn label_obesity_topic(df: &DataFrame) -> Result<DataFrame, FusionError> {
    let labeled = df
        .clone()
        .lazy()
        .with_column(
            col(TOPIC)
                .cast(DataType::String)
                .eq(lit(OBESITY_TOPIC))
                .fill_null(lit(false))
                .cast(DataType::Int32)
                .alias(OBESITY_BINARY),
        )
        .collect()?;
    Ok(labeled)
}

/// Return `chronic_combined` with a predicted `Obesity_Binary` column.
pub fn predict_obesity(
    nutri_combined: &DataFrame,
    chronic_combined: &DataFrame,
    class_weight: ClassWeight,
    forest: &ForestConfig,
) -> Result<DataFrame, FusionError> {
    let nutri = label_obesity_topic(nutri_combined)?;

    let model = StratifiedClassifier::fit(
        ModelSpec::new("obesity", &OBESITY_FEATURES, OBESITY_BINARY, class_weight),
        &nutri,
        forest,
    )?;
    let predicted = model.predict(chronic_combined)?;

    let flags: Vec<i32> = predicted
        .iter()
        .map(|label| if label == "1" { 1 } else { 0 })
        .collect();
    let positives = flags.iter().filter(|&&f| f == 1).count();

    let mut labeled = chronic_combined.clone();
    labeled.with_column(Column::new(OBESITY_BINARY.into(), flags))?;

    info!(
        "Obesity_Binary assigned: {positives} of {} chronic rows positive",
        labeled.height()
    );
    Ok(labeled)
}
