//! End-to-end run: load, snapshot, clean, fuse, write results and charts.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::analysis::{self, DiseaseSummary, NamedChart, SurveySource};
use crate::config::{ChronicSource, ConfigError, PipelineConfig};
use crate::data::{DataLoader, LoaderError};
use crate::fusion::{fuse, CleanedSources, FusionError, FusionOutput, RawSources};

pub const WEARABLE_SNAPSHOT: &str = "aw_fb_data_loaded.csv";
pub const NUTRITION_SNAPSHOT: &str = "nutri_data_loaded.csv";
pub const CHRONIC_SNAPSHOT: &str = "chronic_data_loaded.csv";
pub const NUTRI_COMBINED_FILE: &str = "nutri_combined.csv";
pub const CHRONIC_COMBINED_FILE: &str = "chronic_combined.csv";
pub const FINAL_RESULTS_FILE: &str = "final_results.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error(transparent)]
    Fusion(#[from] FusionError),
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write run summary {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Table heights at each stage of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowCounts {
    pub wearable_raw: usize,
    pub nutrition_raw: usize,
    pub chronic_raw: usize,
    pub wearable_clean: usize,
    pub nutri_combined: usize,
    pub chronic_combined: usize,
    pub final_results: usize,
}

/// Written as `run_summary.json` next to the result tables.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows: RowCounts,
    pub diseases: DiseaseSummary,
    pub charts_written: usize,
}

/// Drives one pipeline run.
pub struct Pipeline;

impl Pipeline {
    pub fn run(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
        create_dir(&config.data_dir)?;
        create_dir(&config.results_dir)?;

        let raw = Self::load_sources(config)?;
        let cleaned = CleanedSources::from_raw(&raw)?;
        info!(
            "Cleaned sources: {} wearable rows, nutrition views {}/{}/{}, chronic views {}/{}/{}",
            cleaned.wearable.height(),
            cleaned.nutrition.sex.height(),
            cleaned.nutrition.age.height(),
            cleaned.nutrition.race.height(),
            cleaned.chronic.sex.height(),
            cleaned.chronic.age.height(),
            cleaned.chronic.race.height(),
        );

        let mut charts_written = 0;
        if config.plots {
            charts_written += render(exploratory_charts(&cleaned), &config.results_dir);
        }

        let output = fuse(&cleaned, &config.models)?;
        Self::write_results(&output, &config.results_dir)?;

        let diseases = match analysis::summarize_diseases(&output.final_results) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Disease summary failed: {e}");
                DiseaseSummary::default()
            }
        };
        if config.plots {
            charts_written += render(result_charts(&output, &diseases), &config.results_dir);
        }

        let summary = RunSummary {
            rows: RowCounts {
                wearable_raw: raw.wearable.height(),
                nutrition_raw: raw.nutrition.height(),
                chronic_raw: raw.chronic.height(),
                wearable_clean: cleaned.wearable.height(),
                nutri_combined: output.nutri_combined.height(),
                chronic_combined: output.chronic_combined.height(),
                final_results: output.final_results.height(),
            },
            diseases,
            charts_written,
        };
        write_summary(&summary, &config.results_dir.join(RUN_SUMMARY_FILE))?;

        info!("Pipeline finished, results in {}", config.results_dir.display());
        Ok(summary)
    }

    /// Load the three sources and snapshot each into the data directory.
    pub fn load_sources(config: &PipelineConfig) -> Result<RawSources, PipelineError> {
        let wearable = DataLoader::load_csv(&config.wearable_path)?;
        let nutrition = DataLoader::load_csv(&config.nutrition_path)?;
        let chronic = match &config.chronic {
            ChronicSource::Url(url) => DataLoader::fetch_csv(url)?,
            ChronicSource::File(path) => DataLoader::load_csv(path)?,
        };

        DataLoader::write_csv(&wearable, &config.data_dir.join(WEARABLE_SNAPSHOT))?;
        DataLoader::write_csv(&nutrition, &config.data_dir.join(NUTRITION_SNAPSHOT))?;
        DataLoader::write_csv(&chronic, &config.data_dir.join(CHRONIC_SNAPSHOT))?;

        Ok(RawSources {
            wearable,
            nutrition,
            chronic,
        })
    }

    pub fn write_results(output: &FusionOutput, dir: &Path) -> Result<(), PipelineError> {
        DataLoader::write_csv(&output.nutri_combined, &dir.join(NUTRI_COMBINED_FILE))?;
        DataLoader::write_csv(&output.chronic_combined, &dir.join(CHRONIC_COMBINED_FILE))?;
        DataLoader::write_csv(&output.final_results, &dir.join(FINAL_RESULTS_FILE))?;
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|source| PipelineError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).map_err(|source| PipelineError::Summary {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn render(charts: PolarsResult<Vec<NamedChart>>, dir: &Path) -> usize {
    match charts {
        Ok(charts) => analysis::render_charts(&charts, dir),
        Err(e) => {
            warn!("Unable to build charts: {e}");
            0
        }
    }
}

fn exploratory_charts(cleaned: &CleanedSources) -> PolarsResult<Vec<NamedChart>> {
    let mut charts = vec![NamedChart::Bar(
        "aw_fb_analysis.png",
        analysis::wearable_device_chart(&cleaned.wearable)?,
    )];
    charts.extend(analysis::survey_charts(SurveySource::Nutrition, &cleaned.nutrition)?);
    charts.extend(analysis::survey_charts(SurveySource::Chronic, &cleaned.chronic)?);
    Ok(charts)
}

fn result_charts(output: &FusionOutput, diseases: &DiseaseSummary) -> PolarsResult<Vec<NamedChart>> {
    let mut charts = analysis::disease_charts(diseases);
    charts.push(NamedChart::Box(
        "bmi_by_sex_age.png",
        analysis::bmi_chart(&output.final_results)?,
    ));
    Ok(charts)
}
