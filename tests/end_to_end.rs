use std::fs;

use polars::prelude::*;

use health_fusion::config::{ChronicSource, ModelConfig, PipelineConfig};
use health_fusion::data::schema::string_values;
use health_fusion::data::DataLoader;
use health_fusion::fusion::{fuse, CleanedSources, RawSources};
use health_fusion::model::ForestConfig;
use health_fusion::pipeline::{Pipeline, FINAL_RESULTS_FILE, RUN_SUMMARY_FILE, WEARABLE_SNAPSHOT};

const OBESITY: &str = "Obesity / Weight Status";

/// Every nutrition row in Texas is about obesity, every Ohio row is not.
/// Sex and age views carry a single class, so imputed demographics are constant.
fn nutrition() -> DataFrame {
    df!(
        "YearStart" => &[2019i64, 2019, 2020, 2020, 2019, 2020, 2021, 2019, 2020, 2021],
        "YearEnd" => &[2019i64, 2019, 2020, 2020, 2019, 2020, 2021, 2019, 2020, 2021],
        "LocationDesc" => &["Texas", "Ohio", "Texas", "Ohio", "Texas", "Texas", "Texas", "Ohio", "Ohio", "Ohio"],
        "Topic" => &[OBESITY, "Physical Activity", OBESITY, "Physical Activity", OBESITY, OBESITY, OBESITY, "Physical Activity", "Physical Activity", "Physical Activity"],
        "Sample_Size" => &[500i64, 420, 380, 610, 290, 300, 310, 320, 330, 340],
        "StratificationCategory1" => &["Sex", "Sex", "Age (years)", "Age (years)", "Age (years)", "Race/Ethnicity", "Race/Ethnicity", "Race/Ethnicity", "Race/Ethnicity", "Race/Ethnicity"],
        "Stratification1" => &["Female", "Female", "25 - 34", "35 - 44", "Data not reported", "Hispanic", "Hispanic", "White", "White", "White"],
    )
    .unwrap()
}

/// Texas chronic rows are all diabetes, so that is the only obesity-positive topic.
fn chronic() -> DataFrame {
    df!(
        "YearStart" => &[2019i64, 2019, 2020, 2020, 2019, 2020, 2019, 2020],
        "YearEnd" => &[2019i64, 2019, 2020, 2020, 2019, 2020, 2019, 2020],
        "LocationDesc" => &["Texas", "Ohio", "Texas", "Ohio", "Texas", "Texas", "Ohio", "Ohio"],
        "Topic" => &["Diabetes", "Asthma", "Diabetes", "Asthma", "Diabetes", "Diabetes", "Asthma", "Asthma"],
        "StratificationCategory1" => &["Sex", "Sex", "Age", "Age", "Race/Ethnicity", "Race/Ethnicity", "Race/Ethnicity", "Race/Ethnicity"],
        "Stratification1" => &["Female", "Female", "Age 18-44", "Age 18-44", "Hispanic", "Hispanic", "White", "White"],
    )
    .unwrap()
}

/// One subject per combination of the heart-rate and BMI flags.
///
/// resting 70, heart rate 80, intensity 0.6 gives a target of 76; a
/// deviation of 1 sets the heart-rate flag and 5 clears it. 170 cm at 70 kg
/// sets the BMI flag, 50 kg clears it.
fn wearable() -> DataFrame {
    df!(
        "device" => &["apple watch", "fitbit", "apple watch", "fitbit"],
        "activity" => &["Lying", "Sitting", "Running 3 METs", "Self Pace walk"],
        "gender" => &[0i64, 1, 0, 1],
        "age" => &[30i64, 35, 40, 28],
        "height" => &[170.0, 170.0, 170.0, 170.0],
        "weight" => &[70.0, 70.0, 50.0, 50.0],
        "hear_rate" => &[80.0, 80.0, 80.0, 80.0],
        "sd_norm_heart" => &[1.0, 5.0, 1.0, 5.0],
        "resting_heart" => &[70.0, 70.0, 70.0, 70.0],
        "intensity_karvonen" => &[0.6, 0.6, 0.6, 0.6],
    )
    .unwrap()
}

fn models() -> ModelConfig {
    ModelConfig {
        forest: ForestConfig {
            n_trees: 25,
            ..ForestConfig::default()
        },
        ..ModelConfig::default()
    }
}

fn raw_sources() -> RawSources {
    RawSources {
        wearable: wearable(),
        nutrition: nutrition(),
        chronic: chronic(),
    }
}

#[test]
fn fusion_assigns_only_through_the_gate() {
    let cleaned = CleanedSources::from_raw(&raw_sources()).unwrap();
    let output = fuse(&cleaned, &models()).unwrap();

    assert_eq!(output.nutri_combined.height(), 5);
    assert_eq!(output.chronic_combined.height(), 4);
    assert_eq!(
        string_values(&output.nutri_combined, "Age_Bin").unwrap(),
        vec![Some("18-44".to_string()); 5]
    );

    let obesity: Vec<Option<i32>> = output
        .chronic_labeled
        .column("Obesity_Binary")
        .unwrap()
        .i32()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(obesity, vec![Some(1), Some(1), Some(0), Some(0)]);

    let final_results = &output.final_results;
    assert_eq!(final_results.height(), 4);
    assert_eq!(
        string_values(final_results, "Possible_Disease").unwrap(),
        vec![Some("Diabetes".to_string()); 4]
    );
    assert_eq!(
        string_values(final_results, "Assigned_Disease").unwrap(),
        vec![Some("Diabetes".to_string()), None, None, None]
    );
}

#[test]
fn fusion_is_deterministic_for_a_seed() {
    let cleaned = CleanedSources::from_raw(&raw_sources()).unwrap();
    let first = fuse(&cleaned, &models()).unwrap();
    let second = fuse(&cleaned, &models()).unwrap();

    assert!(first.final_results.equals_missing(&second.final_results));
    assert!(first.chronic_labeled.equals_missing(&second.chronic_labeled));
}

#[test]
fn pipeline_writes_snapshots_results_and_summary() {
    let input = tempfile::tempdir().unwrap();
    let wearable_path = input.path().join("aw_fb_data.csv");
    let nutrition_path = input.path().join("nutrition.csv");
    let chronic_path = input.path().join("chronic.csv");
    DataLoader::write_csv(&wearable(), &wearable_path).unwrap();
    DataLoader::write_csv(&nutrition(), &nutrition_path).unwrap();
    DataLoader::write_csv(&chronic(), &chronic_path).unwrap();

    let data_dir = input.path().join("data");
    let results_dir = input.path().join("results");
    let config = PipelineConfig {
        data_dir: data_dir.clone(),
        results_dir: results_dir.clone(),
        wearable_path,
        nutrition_path,
        chronic: ChronicSource::File(chronic_path),
        models: models(),
        plots: false,
    };

    let summary = Pipeline::run(&config).unwrap();

    assert_eq!(summary.rows.wearable_raw, 4);
    assert_eq!(summary.rows.final_results, 4);
    assert_eq!(summary.diseases.total_assigned(), 1);
    assert_eq!(summary.charts_written, 0);

    assert!(data_dir.join(WEARABLE_SNAPSHOT).exists());
    let final_results = DataLoader::load_csv(&results_dir.join(FINAL_RESULTS_FILE)).unwrap();
    assert_eq!(final_results.height(), 4);
    assert!(final_results.column("Assigned_Disease").is_ok());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results_dir.join(RUN_SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(json["rows"]["chronic_combined"], 4);
    assert_eq!(json["diseases"]["counts"][0][0], "Diabetes");
}

#[test]
fn pipeline_draws_every_chart_when_plots_are_enabled() {
    let input = tempfile::tempdir().unwrap();
    let wearable_path = input.path().join("aw_fb_data.csv");
    let nutrition_path = input.path().join("nutrition.csv");
    let chronic_path = input.path().join("chronic.csv");
    DataLoader::write_csv(&wearable(), &wearable_path).unwrap();
    DataLoader::write_csv(&nutrition(), &nutrition_path).unwrap();
    DataLoader::write_csv(&chronic(), &chronic_path).unwrap();

    let results_dir = input.path().join("results");
    let config = PipelineConfig {
        data_dir: input.path().join("data"),
        results_dir: results_dir.clone(),
        wearable_path,
        nutrition_path,
        chronic: ChronicSource::File(chronic_path),
        models: models(),
        plots: true,
    };

    let summary = Pipeline::run(&config).unwrap();

    assert_eq!(summary.charts_written, 11);
    for file in [
        "aw_fb_analysis.png",
        "nutri_age_analysis.png",
        "chronic_race_analysis.png",
        "disease_counts.png",
        "disease_by_sex.png",
        "disease_by_age.png",
        "bmi_by_sex_age.png",
    ] {
        assert!(results_dir.join(file).exists(), "{file} was not written");
    }
}

#[test]
fn missing_input_file_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        data_dir: dir.path().join("data"),
        results_dir: dir.path().join("results"),
        wearable_path: dir.path().join("absent.csv"),
        nutrition_path: dir.path().join("absent_too.csv"),
        chronic: ChronicSource::File(dir.path().join("chronic.csv")),
        models: models(),
        plots: false,
    };

    let err = Pipeline::run(&config).unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
    assert!(!dir.path().join("results").join(FINAL_RESULTS_FILE).exists());
}
