//! Disease assignment for wearable subjects.
//!
//! A multiclass model trained on obesity-positive chronic rows proposes a
//! disease per subject from Sex and Age_Bin. The proposal is only kept when
//! the subject's own heart-rate and BMI flags are both set.

use log::info;
use polars::prelude::*;

use crate::data::schema::{
    require_columns, ASSIGNED_DISEASE, DISEASE, IMPUTED_AGE_BIN, OBESITY_BINARY, POSSIBLE_DISEASE,
    POSSIBLE_OBESITY, SEX, TOPIC,
};
use crate::model::{ClassWeight, ForestConfig, ModelSpec, StratifiedClassifier};

use super::FusionError;

pub const DISEASE_FEATURES: [&str; 2] = [SEX, IMPUTED_AGE_BIN];

/// Gate a candidate label on both wearable flags; otherwise null.
pub fn assignment_gate() -> Expr {
    when(
        col(DISEASE)
            .eq(lit(1))
            .and(col(POSSIBLE_OBESITY).eq(lit(1)))
            .fill_null(lit(false)),
    )
    .then(col(POSSIBLE_DISEASE))
    .otherwise(lit(NULL).cast(DataType::String))
    .alias(ASSIGNED_DISEASE)
}

/// Return `wearable` with `Possible_Disease` and `Assigned_Disease` columns.
pub fn assign_disease(
    chronic_labeled: &DataFrame,
    wearable: &DataFrame,
    class_weight: ClassWeight,
    forest: &ForestConfig,
) -> Result<DataFrame, FusionError> {
    require_columns(chronic_labeled, "obesity-labeled chronic", &[OBESITY_BINARY, TOPIC])?;
    require_columns(wearable, "wearable", &[SEX, IMPUTED_AGE_BIN, DISEASE, POSSIBLE_OBESITY])?;

    let train = chronic_labeled
        .clone()
        .lazy()
        .filter(col(OBESITY_BINARY).eq(lit(1)))
        .collect()?;
    if train.height() == 0 {
        return Err(FusionError::EmptyTrainingSet {
            model: "disease".to_string(),
        });
    }

    info!("Training disease model on {} obesity-positive rows", train.height());
    let model = StratifiedClassifier::fit(
        ModelSpec::new("disease", &DISEASE_FEATURES, TOPIC, class_weight),
        &train,
        forest,
    )?;
    let candidates = model.predict(wearable)?;

    let mut assigned = wearable.clone();
    assigned.with_column(Column::new(POSSIBLE_DISEASE.into(), candidates))?;
    let assigned = assigned.lazy().with_column(assignment_gate()).collect()?;

    let n_assigned = assigned.height() - assigned.column(ASSIGNED_DISEASE)?.null_count();
    info!(
        "Assigned a disease to {n_assigned} of {} wearable subjects",
        assigned.height()
    );
    Ok(assigned)
}
