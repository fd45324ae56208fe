use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::ArgMatches;
use disruption_classifiers::config::{load_config, ModelType, PipelineConfig};

use crate::util::validate_dataset_file;

pub const DEFAULT_REPORT_FILE: &str = "disruption_report.json";

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data: PathBuf,
    pub output: PathBuf,
    pub pipeline: PipelineConfig,
}

impl TrainConfig {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut pipeline = match matches.get_one::<PathBuf>("config") {
            Some(config_path) => {
                log::info!("[Disruption::Train] Using config: {:?}", config_path);
                load_config(config_path)?
            }
            None => {
                log::info!("[Disruption::Train] No config provided; using defaults.");
                PipelineConfig::default()
            }
        };

        // Apply CLI overrides
        if let Some(seed) = matches.get_one::<u64>("seed") {
            pipeline.seed = *seed;
        }
        if let Some(folds) = matches.get_one::<usize>("folds") {
            pipeline.k_folds = *folds;
        }
        if let Some(model_type) = matches.get_one::<String>("model_type") {
            pipeline.model = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
        }
        if let Some(label_column) = matches.get_one::<String>("label_column") {
            pipeline.label_column = label_column.clone();
        }
        if matches.get_flag("no_explain") {
            pipeline.explain = false;
        }

        let data = matches
            .get_one::<String>("data")
            .ok_or_else(|| anyhow::anyhow!("No input data file given"))?;
        let data = validate_dataset_file(data)?;

        let output = matches
            .get_one::<PathBuf>("output_file")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE));

        Ok(TrainConfig {
            data,
            output,
            pipeline,
        })
    }
}
