pub mod input;
pub mod output;

use anyhow::{Context, Result};
use disruption_classifiers::io::read_dataset_csv;
use disruption_classifiers::pipeline::DisruptionPipeline;
use disruption_classifiers::report::{write_report, RunReport};

use input::TrainConfig;

/// Load the dataset, run the pipeline and write the JSON report.
pub fn run_training(config: &TrainConfig) -> Result<RunReport> {
    let dataset = read_dataset_csv(&config.data, &config.pipeline.label_column)?;
    log::info!(
        "[Disruption::Train] Loaded {} samples ({} disruptions) from {}",
        dataset.len(),
        dataset.n_positive(),
        config.data.display()
    );

    let pipeline = DisruptionPipeline::new(config.pipeline.clone());
    let output = pipeline.run(&dataset)?;

    let report = RunReport::new(
        &output,
        pipeline.config(),
        Some(config.data.display().to_string()),
    );
    write_report(&report, &config.output)
        .with_context(|| format!("Failed to save report for {}", config.data.display()))?;
    log::info!("[Disruption::Train] Report written to {}", config.output.display());
    Ok(report)
}
