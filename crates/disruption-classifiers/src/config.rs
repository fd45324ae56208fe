use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{Component, PipelineError};
use crate::stats::RankingMetric;

/// Model families the pipeline can train.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelType {
    /// Native gradient-boosted trees; supports TreeSHAP attributions.
    BoostedTrees {
        #[serde(default = "default_max_bins")]
        max_bins: usize,
        #[serde(default = "default_min_samples_leaf")]
        min_samples_leaf: usize,
    },
    /// Wrapper around the `gbdt` crate. Cannot be explained.
    Gbdt {
        #[serde(default = "default_training_optimization_level")]
        training_optimization_level: u8,
        #[serde(default = "default_loss_type")]
        loss_type: String,
    },
}

fn default_max_bins() -> usize {
    255
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_training_optimization_level() -> u8 {
    2
}

fn default_loss_type() -> String {
    "LogLikelyhood".to_string()
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::BoostedTrees {
            max_bins: default_max_bins(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::BoostedTrees { .. } => "boosted_trees",
            ModelType::Gbdt { .. } => "gbdt",
        }
    }

    /// Reject backend options no model can be built from.
    pub fn validate(&self, component: Component) -> crate::error::Result<()> {
        match self {
            ModelType::BoostedTrees {
                max_bins,
                min_samples_leaf,
            } => {
                if *max_bins < 2 || *max_bins > u16::MAX as usize {
                    return Err(PipelineError::invalid_parameter(
                        component,
                        "max_bins",
                        max_bins,
                        "must lie in [2, 65535]",
                    ));
                }
                if *min_samples_leaf == 0 {
                    return Err(PipelineError::invalid_parameter(
                        component,
                        "min_samples_leaf",
                        min_samples_leaf,
                        "must be at least 1",
                    ));
                }
                Ok(())
            }
            ModelType::Gbdt { .. } => Ok(()),
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boosted_trees" | "boosted-trees" => Ok(ModelType::default()),
            "gbdt" => Ok(ModelType::Gbdt {
                training_optimization_level: default_training_optimization_level(),
                loss_type: default_loss_type(),
            }),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: boosted_trees, gbdt",
                s
            )),
        }
    }
}

/// One point of the hyperparameter grid.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ParameterSetting {
    pub learning_rate: f64,
    pub max_depth: usize,
    pub n_estimators: usize,
    pub subsample: f64,
}

impl Default for ParameterSetting {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 3,
            n_estimators: 100,
            subsample: 1.0,
        }
    }
}

/// Named candidate lists searched exhaustively.
///
/// Enumeration is canonical: parameter names in lexicographic order
/// (`learning_rate`, `max_depth`, `n_estimators`, `subsample`), the last
/// name varying fastest. Tie-breaking in the search relies on this order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ParameterGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl ParameterSetting {
    /// `learning_rate` must be finite and positive, `subsample` in `(0, 1]`.
    pub fn validate(&self, component: Component) -> crate::error::Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PipelineError::invalid_parameter(
                component,
                "learning_rate",
                self.learning_rate,
                "must be finite and positive",
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(PipelineError::invalid_parameter(
                component,
                "subsample",
                self.subsample,
                "must lie in (0, 1]",
            ));
        }
        Ok(())
    }
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            learning_rate: vec![0.01, 0.1, 0.2],
            max_depth: vec![3, 5, 7],
            subsample: vec![0.8, 1.0],
        }
    }
}

impl ParameterGrid {
    /// Grid holding exactly one setting.
    pub fn single(setting: ParameterSetting) -> Self {
        Self {
            n_estimators: vec![setting.n_estimators],
            learning_rate: vec![setting.learning_rate],
            max_depth: vec![setting.max_depth],
            subsample: vec![setting.subsample],
        }
    }

    /// Number of settings in the Cartesian product.
    pub fn len(&self) -> usize {
        self.learning_rate.len() * self.max_depth.len() * self.n_estimators.len() * self.subsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All settings in canonical order.
    pub fn settings(&self) -> Vec<ParameterSetting> {
        let mut out = Vec::with_capacity(self.len());
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &n_estimators in &self.n_estimators {
                    for &subsample in &self.subsample {
                        out.push(ParameterSetting {
                            learning_rate,
                            max_depth,
                            n_estimators,
                            subsample,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Central configuration for one training-and-explanation run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub split_ratio: f64,
    pub seed: u64,
    pub smote_k: usize,
    pub k_folds: usize,
    pub ranking_metric: RankingMetric,
    pub grid: ParameterGrid,
    /// Lower bound applied to feature standard deviations. When `None`, a
    /// constant feature aborts the run.
    pub scaler_epsilon: Option<f64>,
    pub model: ModelType,
    /// Worker threads for the grid search. `None` uses the global rayon pool.
    pub n_threads: Option<usize>,
    pub label_column: String,
    /// Compute per-sample attributions on the holdout split.
    pub explain: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_ratio: 0.8,
            seed: 42,
            smote_k: 5,
            k_folds: 3,
            ranking_metric: RankingMetric::RocAuc,
            grid: ParameterGrid::default(),
            scaler_epsilon: None,
            model: ModelType::default(),
            n_threads: None,
            label_column: "Disruption".to_string(),
            explain: true,
        }
    }
}

/// Load a pipeline configuration from a JSON file. Missing fields take
/// their default values.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_has_54_settings() {
        let grid = ParameterGrid::default();
        assert_eq!(grid.len(), 54);
        assert_eq!(grid.settings().len(), 54);
    }

    #[test]
    fn enumeration_varies_last_name_fastest() {
        let grid = ParameterGrid::default();
        let settings = grid.settings();
        assert_eq!(settings[0].learning_rate, 0.01);
        assert_eq!(settings[0].subsample, 0.8);
        assert_eq!(settings[1].subsample, 1.0);
        assert_eq!(settings[1].n_estimators, 100);
        assert_eq!(settings[2].n_estimators, 200);
        assert_eq!(settings[53].learning_rate, 0.2);
        assert_eq!(settings[53].max_depth, 7);
    }

    #[test]
    fn empty_list_empties_grid() {
        let grid = ParameterGrid {
            max_depth: vec![],
            ..ParameterGrid::default()
        };
        assert!(grid.is_empty());
        assert!(grid.settings().is_empty());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"seed": 7, "k_folds": 5}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.k_folds, 5);
        assert_eq!(config.smote_k, 5);
        assert_eq!(config.grid, ParameterGrid::default());
        assert_eq!(config.model, ModelType::default());
    }

    #[test]
    fn model_type_from_str() {
        assert_eq!(ModelType::from_str("gbdt").unwrap().name(), "gbdt");
        assert_eq!(
            ModelType::from_str("Boosted_Trees").unwrap(),
            ModelType::default()
        );
        assert!(ModelType::from_str("svm").is_err());
    }

    #[test]
    fn model_fields_default_inside_tagged_enum() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"model": {"type": "gbdt"}, "explain": false}"#).unwrap();
        assert_eq!(config.model, ModelType::from_str("gbdt").unwrap());
        assert!(!config.explain);

        let config: PipelineConfig =
            serde_json::from_str(r#"{"model": {"type": "boosted_trees", "max_bins": 64}}"#).unwrap();
        assert_eq!(
            config.model,
            ModelType::BoostedTrees {
                max_bins: 64,
                min_samples_leaf: 1
            }
        );
    }

    #[test]
    fn setting_validation_bounds() {
        let ok = ParameterSetting::default();
        assert!(ok.validate(Component::ClassifierModel).is_ok());
        assert!(ParameterSetting { subsample: 1.0, ..ok }
            .validate(Component::ClassifierModel)
            .is_ok());

        let err = ParameterSetting { subsample: 0.0, ..ok }
            .validate(Component::HyperparameterSearchEngine)
            .unwrap_err();
        assert_eq!(err.component(), Component::HyperparameterSearchEngine);
        assert!(err.to_string().contains("subsample"));

        for lr in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let setting = ParameterSetting { learning_rate: lr, ..ok };
            assert!(setting.validate(Component::ClassifierModel).is_err());
        }
    }

    #[test]
    fn boosted_trees_options_are_validated() {
        assert!(ModelType::default().validate(Component::ClassifierModel).is_ok());
        let one_bin = ModelType::BoostedTrees {
            max_bins: 1,
            min_samples_leaf: 1,
        };
        assert!(one_bin.validate(Component::ClassifierModel).is_err());
        let empty_leaf = ModelType::BoostedTrees {
            max_bins: 255,
            min_samples_leaf: 0,
        };
        assert!(empty_leaf.validate(Component::ClassifierModel).is_err());
    }
}
