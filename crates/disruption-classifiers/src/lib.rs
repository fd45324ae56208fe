//! disruption-classifiers: training and explanation pipeline for plasma
//! disruption prediction.
//!
//! A labeled dataset of nine diagnostic measurements is split into train and
//! holdout sets, standardised, rebalanced with SMOTE, and used to tune a
//! gradient-boosted tree classifier by stratified k-fold grid search. The
//! selected model is evaluated on the holdout split and every holdout
//! prediction is broken down into additive per-feature attributions.
//!
//! The components can be used individually; `pipeline::DisruptionPipeline`
//! chains them for a full run and `report::RunReport` captures the results.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod explain;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod resampling;
pub mod search;
pub mod stats;

pub use config::{ModelType, ParameterGrid, ParameterSetting, PipelineConfig};
pub use data_handling::Dataset;
pub use error::{Component, PipelineError};
pub use pipeline::{DisruptionPipeline, PipelineOutput};
