//! Data Processor Module
//! Cleans the three raw sources into harmonized, demographically stratified tables.

use log::{debug, info};
use polars::prelude::*;
use thiserror::Error;

use super::schema::{
    self, require_columns, string_values, AGE_BIN, LOCATION, RACE, SAMPLE_SIZE, SEX,
    STRAT_CATEGORY, STRAT_VALUE, TOPIC, YEAR_END, YEAR_START,
};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Table `{table}` is missing column `{column}`")]
    MissingColumn { table: String, column: String },
}

/// Raw wearable columns consumed by the cleaner.
const WEARABLE_COLUMNS: [&str; 10] = [
    "device",
    "activity",
    "gender",
    "age",
    "height",
    "weight",
    "hear_rate",
    "sd_norm_heart",
    "resting_heart",
    "intensity_karvonen",
];

const NUTRITION_COLUMNS: [&str; 7] = [
    YEAR_START,
    YEAR_END,
    LOCATION,
    TOPIC,
    SAMPLE_SIZE,
    STRAT_CATEGORY,
    STRAT_VALUE,
];

const CHRONIC_COLUMNS: [&str; 6] = [
    YEAR_START,
    YEAR_END,
    LOCATION,
    TOPIC,
    STRAT_CATEGORY,
    STRAT_VALUE,
];

/// `StratificationCategory1` values naming each axis, per source.
#[derive(Debug, Clone, Copy)]
struct Categories {
    sex: &'static str,
    age: &'static str,
    race: &'static str,
}

const NUTRITION_CATEGORIES: Categories = Categories {
    sex: "Sex",
    age: "Age (years)",
    race: "Race/Ethnicity",
};

const CHRONIC_CATEGORIES: Categories = Categories {
    sex: "Sex",
    age: "Age",
    race: "Race/Ethnicity",
};

/// One survey source partitioned along the three demographic axes.
///
/// Each view carries the shared feature columns plus exactly one
/// stratification column: `Sex`, `age_bin` or `Race/Ethnicity`.
#[derive(Debug, Clone)]
pub struct StratifiedViews {
    pub sex: DataFrame,
    pub age: DataFrame,
    pub race: DataFrame,
}

/// Map a nutrition survey age label onto a canonical bin.
pub fn map_nutrition_age(label: &str) -> Option<&'static str> {
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "18-24" | "25-34" | "35-44" => Some("18-44"),
        "45-54" | "55-64" => Some("45-64"),
        "65orolder" => Some("65+"),
        _ => None,
    }
}

/// Map a chronic indicator age label (`Age 18-44`, `Age >=65`, ...) onto a canonical bin.
pub fn map_chronic_age(label: &str) -> Option<&'static str> {
    let trimmed = label.trim();
    let trimmed = trimmed.strip_prefix("Age ").unwrap_or(trimmed);
    match trimmed {
        "18-44" => Some("18-44"),
        "45-64" => Some("45-64"),
        ">=65" => Some("65+"),
        _ => None,
    }
}

/// Handles the per-source cleaning and reshaping operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Clean the wearable table and derive BMI, target heart rate and both flags.
    ///
    /// Output columns: Device, Activity, Sex, Age, Age_Bin, Height_cm, Weight_kg,
    /// BMI, heart_rate, sd_norm_heart, resting_heart, intensity_karvonen,
    /// target_heart_rate, Disease, Possible Obesity.
    pub fn clean_wearable(raw: &DataFrame) -> Result<DataFrame, ProcessorError> {
        info!("Cleaning wearable data ({} rows)", raw.height());
        require_columns(raw, "wearable", &WEARABLE_COLUMNS)?;

        let device = col("device").cast(DataType::String).str().to_lowercase();
        let gender = col("gender").cast(DataType::String).str().to_lowercase();
        let age = col("age").cast(DataType::Float64);
        // Polars orders NaN above every number; a NaN must fail every threshold.
        let age_known = age.clone().is_not_nan();
        let height = col("height").cast(DataType::Float64);
        let weight = col("weight").cast(DataType::Float64);
        let height_m = height.clone() / lit(100.0);

        let base = raw
            .clone()
            .lazy()
            .select([
                when(device.clone().eq(lit("apple watch")))
                    .then(lit("Apple Watch"))
                    .when(device.eq(lit("fitbit")))
                    .then(lit("Fitbit"))
                    .otherwise(lit(NULL).cast(DataType::String))
                    .alias(schema::DEVICE),
                col("activity").alias("Activity"),
                when(gender.clone().eq(lit("1")).or(gender.clone().eq(lit("male"))))
                    .then(lit("Male"))
                    .when(gender.clone().eq(lit("0")).or(gender.eq(lit("female"))))
                    .then(lit("Female"))
                    .otherwise(lit(NULL).cast(DataType::String))
                    .alias(SEX),
                age.clone().alias("Age"),
                when(
                    age_known
                        .clone()
                        .and(age.clone().gt_eq(lit(18.0)))
                        .and(age.clone().lt_eq(lit(44.0))),
                )
                .then(lit("18-44"))
                .when(
                    age_known
                        .clone()
                        .and(age.clone().gt_eq(lit(45.0)))
                        .and(age.clone().lt_eq(lit(64.0))),
                )
                .then(lit("45-64"))
                .when(age_known.and(age.gt_eq(lit(65.0))))
                .then(lit("65+"))
                .otherwise(lit("other"))
                .alias(schema::IMPUTED_AGE_BIN),
                height.alias("Height_cm"),
                weight.clone().alias("Weight_kg"),
                (weight / (height_m.clone() * height_m)).alias(schema::BMI),
                col("hear_rate").cast(DataType::Float64).alias("heart_rate"),
                col("sd_norm_heart").cast(DataType::Float64),
                col("resting_heart").cast(DataType::Float64),
                col("intensity_karvonen").cast(DataType::Float64),
            ])
            .with_column(
                (col("resting_heart")
                    + (col("heart_rate") - col("resting_heart")) * col("intensity_karvonen"))
                .alias("target_heart_rate"),
            );

        let heart_rate = col("heart_rate");
        let target = col("target_heart_rate");
        let spread = lit(2.0) * col("sd_norm_heart");
        let bmi = col(schema::BMI);

        let cleaned = base
            .with_columns([
                heart_rate
                    .clone()
                    .is_not_nan()
                    .and(heart_rate.clone().gt(target.clone() + spread.clone()))
                    .and(heart_rate.gt(target - spread))
                    .fill_null(lit(false))
                    .cast(DataType::Int32)
                    .alias(schema::DISEASE),
                // Literal reading of `18.5 <= BMI > 18.5 <= 24.9`; selects BMI > 18.5.
                bmi.clone()
                    .is_not_nan()
                    .and(lit(18.5).lt_eq(bmi.clone()))
                    .and(bmi.gt(lit(18.5)))
                    .and(lit(18.5).lt_eq(lit(24.9)))
                    .fill_null(lit(false))
                    .cast(DataType::Int32)
                    .alias(schema::POSSIBLE_OBESITY),
            ])
            .collect()?;

        info!("Wearable data cleaned ({} rows)", cleaned.height());
        Ok(cleaned)
    }

    /// Split the nutrition survey into sex, age and race views.
    pub fn clean_nutrition(raw: &DataFrame) -> Result<StratifiedViews, ProcessorError> {
        info!("Cleaning nutrition data ({} rows)", raw.height());
        require_columns(raw, "nutrition", &NUTRITION_COLUMNS)?;
        let kept = raw.select(NUTRITION_COLUMNS)?;
        Self::split_views(&kept, NUTRITION_CATEGORIES, map_nutrition_age)
    }

    /// Split the chronic disease indicators into sex, age and race views.
    pub fn clean_chronic(raw: &DataFrame) -> Result<StratifiedViews, ProcessorError> {
        info!("Cleaning chronic data ({} rows)", raw.height());
        require_columns(raw, "chronic", &CHRONIC_COLUMNS)?;
        let kept = raw.select(CHRONIC_COLUMNS)?;
        Self::split_views(&kept, CHRONIC_CATEGORIES, map_chronic_age)
    }

    fn split_views(
        df: &DataFrame,
        categories: Categories,
        map_age: fn(&str) -> Option<&'static str>,
    ) -> Result<StratifiedViews, ProcessorError> {
        let sex = Self::stratum(df, categories.sex, SEX)?;
        let race = Self::stratum(df, categories.race, RACE)?;

        let age = Self::stratum(df, categories.age, AGE_BIN)?;
        let age = Self::normalize_age_bins(age, map_age)?;

        debug!(
            "Split into {} sex / {} age / {} race rows",
            sex.height(),
            age.height(),
            race.height()
        );
        Ok(StratifiedViews { sex, age, race })
    }

    /// Rows of one `StratificationCategory1` value, with `Stratification1` renamed.
    fn stratum(df: &DataFrame, category: &str, renamed: &str) -> Result<DataFrame, ProcessorError> {
        let mut view = df
            .clone()
            .lazy()
            .filter(col(STRAT_CATEGORY).cast(DataType::String).eq(lit(category)))
            .collect()?
            .drop(STRAT_CATEGORY)?;
        view.rename(STRAT_VALUE, renamed.into())?;
        // rename leaves the cached schema on the old name
        view.clear_schema();
        Ok(view)
    }

    /// Replace free-text age labels with canonical bins, dropping unmapped rows.
    fn normalize_age_bins(
        mut df: DataFrame,
        map_age: fn(&str) -> Option<&'static str>,
    ) -> Result<DataFrame, ProcessorError> {
        let bins: Vec<Option<&str>> = string_values(&df, AGE_BIN)?
            .iter()
            .map(|label| label.as_deref().and_then(map_age))
            .collect();

        let before = df.height();
        df.with_column(Column::new(AGE_BIN.into(), bins))?;
        let df = df
            .lazy()
            .filter(col(AGE_BIN).is_not_null())
            .collect()?;

        let dropped = before - df.height();
        if dropped > 0 {
            debug!("Dropped {dropped} rows with an unrecognized age label");
        }
        Ok(df)
    }
}
