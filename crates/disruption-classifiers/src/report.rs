//! Serializable summary of one pipeline run.
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ParameterSetting, PipelineConfig};
use crate::evaluation::EvaluationReport;
use crate::explain::AttributionSet;
use crate::pipeline::{PipelineOutput, SplitSummary};
use crate::preprocessing::ScalingProfile;
use crate::resampling::ResamplingSummary;
use crate::search::SearchOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// Where the dataset came from, when known.
    pub source: Option<String>,
    pub config: PipelineConfig,
    pub split: SplitSummary,
    pub scaling: ScalingProfile,
    pub resampling: ResamplingSummary,
    pub search: SearchOutcome,
    pub best_setting: ParameterSetting,
    pub evaluation: EvaluationReport,
    pub attributions: Option<AttributionSet>,
}

impl RunReport {
    pub fn new(output: &PipelineOutput, config: &PipelineConfig, source: Option<String>) -> Self {
        RunReport {
            generated_at: Utc::now(),
            source,
            config: config.clone(),
            split: output.split,
            scaling: output.scaling.clone(),
            resampling: output.resampling,
            search: output.search.clone(),
            best_setting: output.search.best,
            evaluation: output.evaluation.clone(),
            attributions: output.attributions.clone(),
        }
    }
}

/// Write `report` as pretty-printed JSON.
pub fn write_report<P: AsRef<Path>>(report: &RunReport, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

/// Read a report previously written by `write_report`.
pub fn read_report<P: AsRef<Path>>(path: P) -> Result<RunReport> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse report: {}", path.display()))
}
