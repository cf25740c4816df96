//! Health Fusion - command line entry point

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use health_fusion::config::{Cli, PipelineConfig};
use health_fusion::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_cli(cli).context("Invalid configuration")?;

    let summary = Pipeline::run(&config).context("Pipeline run failed")?;
    info!(
        "{} wearable subjects, {} with an assigned disease",
        summary.rows.final_results,
        summary.diseases.total_assigned()
    );
    Ok(())
}
