//! Pipeline configuration: input/output locations and model settings.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fusion::ImputationPolicy;
use crate::model::{ClassWeight, ForestConfig};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const WEARABLE_FILE: &str = "aw_fb_data.csv";
pub const NUTRITION_FILE: &str =
    "Nutrition__Physical_Activity__and_Obesity_-_Behavioral_Risk_Factor_Surveillance_System.csv";
pub const CHRONIC_DATA_URL: &str =
    "https://data.cdc.gov/api/views/hksd-2xuw/rows.csv?accessType=DOWNLOAD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read model config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid model config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fuse wearable readings with nutrition and chronic disease surveys.
#[derive(Parser, Debug, Clone)]
#[command(name = "health_fusion", version, about)]
pub struct Cli {
    /// Directory for input files and load snapshots
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Directory for combined tables, charts and the run summary
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Wearable CSV (defaults to <data-dir>/aw_fb_data.csv)
    #[arg(long)]
    pub wearable: Option<PathBuf>,

    /// Nutrition survey CSV (defaults to the BRFSS file name inside <data-dir>)
    #[arg(long)]
    pub nutrition: Option<PathBuf>,

    /// Chronic disease indicators download URL
    #[arg(long, default_value = CHRONIC_DATA_URL)]
    pub chronic_url: String,

    /// Read chronic disease indicators from a local CSV instead of downloading
    #[arg(long)]
    pub chronic_csv: Option<PathBuf>,

    /// JSON file overriding model settings
    #[arg(long)]
    pub models: Option<PathBuf>,

    /// Skip exploratory and result charts
    #[arg(long)]
    pub skip_plots: bool,
}

/// Where the chronic disease data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChronicSource {
    Url(String),
    File(PathBuf),
}

/// Settings for the four classifiers.
///
/// Class weighting differs between models (the chronic sex model is
/// unweighted); override here rather than in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub forest: ForestConfig,
    pub nutrition_imputation: ImputationPolicy,
    pub chronic_imputation: ImputationPolicy,
    pub obesity_weight: ClassWeight,
    pub disease_weight: ClassWeight,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            nutrition_imputation: ImputationPolicy::NUTRITION,
            chronic_imputation: ImputationPolicy::CHRONIC,
            obesity_weight: ClassWeight::Balanced,
            disease_weight: ClassWeight::Balanced,
        }
    }
}

impl ModelConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub wearable_path: PathBuf,
    pub nutrition_path: PathBuf,
    pub chronic: ChronicSource,
    pub models: ModelConfig,
    pub plots: bool,
}

impl PipelineConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let models = match &cli.models {
            Some(path) => ModelConfig::from_json_file(path)?,
            None => ModelConfig::default(),
        };
        let chronic = match cli.chronic_csv {
            Some(path) => ChronicSource::File(path),
            None => ChronicSource::Url(cli.chronic_url),
        };

        Ok(Self {
            wearable_path: cli
                .wearable
                .unwrap_or_else(|| cli.data_dir.join(WEARABLE_FILE)),
            nutrition_path: cli
                .nutrition
                .unwrap_or_else(|| cli.data_dir.join(NUTRITION_FILE)),
            data_dir: cli.data_dir,
            results_dir: cli.results_dir,
            chronic,
            models,
            plots: !cli.skip_plots,
        })
    }
}
