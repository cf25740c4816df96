//! Column names shared between the sources, and helpers for pulling typed
//! values out of Polars columns.

use polars::prelude::*;

use super::ProcessorError;

// Survey columns (CDC naming)
pub const YEAR_START: &str = "YearStart";
pub const YEAR_END: &str = "YearEnd";
pub const LOCATION: &str = "LocationDesc";
pub const TOPIC: &str = "Topic";
pub const SAMPLE_SIZE: &str = "Sample_Size";
pub const STRAT_CATEGORY: &str = "StratificationCategory1";
pub const STRAT_VALUE: &str = "Stratification1";

// Harmonized demographic columns
pub const SEX: &str = "Sex";
pub const AGE_BIN: &str = "age_bin";
pub const IMPUTED_AGE_BIN: &str = "Age_Bin";
pub const RACE: &str = "Race/Ethnicity";

// Derived labels
pub const OBESITY_BINARY: &str = "Obesity_Binary";
pub const DISEASE: &str = "Disease";
pub const POSSIBLE_OBESITY: &str = "Possible Obesity";
pub const POSSIBLE_DISEASE: &str = "Possible_Disease";
pub const ASSIGNED_DISEASE: &str = "Assigned_Disease";
pub const BMI: &str = "BMI";
pub const DEVICE: &str = "Device";

/// The canonical age bins every source is mapped onto.
pub const AGE_BINS: [&str; 3] = ["18-44", "45-64", "65+"];

/// Return an error naming the first column of `columns` absent from `df`.
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<(), ProcessorError> {
    for column in columns {
        if df.get_column_index(column).is_none() {
            return Err(ProcessorError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Values of a column rendered as strings, nulls preserved.
pub fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Values of a column cast to `f64`, nulls preserved.
pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Whether a column holds numbers (passed through as-is by the encoder).
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_columns_names_the_missing_column() {
        let df = df!("YearStart" => &[2019i64], "Topic" => &["Asthma"]).unwrap();

        assert!(require_columns(&df, "nutrition", &[YEAR_START, TOPIC]).is_ok());

        let err = require_columns(&df, "nutrition", &[YEAR_START, LOCATION]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table `nutrition` is missing column `LocationDesc`"
        );
    }

    #[test]
    fn string_values_render_numbers_and_keep_nulls() {
        let df = df!("YearStart" => &[Some(2019i64), None]).unwrap();
        let values = string_values(&df, YEAR_START).unwrap();
        assert_eq!(values, vec![Some("2019".to_string()), None]);
    }
}
