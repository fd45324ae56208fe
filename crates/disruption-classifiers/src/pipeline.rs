//! End-to-end training and explanation run.
//!
//! Stages run strictly in order, each consuming the previous stage's output:
//! split, scale, oversample, grid search, final fit, evaluate, explain. One
//! `StdRng` seeded from the configuration drives every random draw, so a run
//! is reproducible from `(dataset, config)`.
use std::fmt;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data_handling::{split, ClassBalance, Dataset};
use crate::error::{Component, PipelineError, Result};
use crate::evaluation::{evaluate, EvaluationReport};
use crate::explain::{explain, AttributionSet};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::preprocessing::{fit_scaler, transform_all, ScalingProfile};
use crate::resampling::{resample, ResamplingSummary};
use crate::search::{search, SearchOptions, SearchOutcome};

/// Class balance of the dataset and of both split sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub ratio: f64,
    pub dataset: ClassBalance,
    pub train: ClassBalance,
    pub holdout: ClassBalance,
}

/// Everything a run produces.
pub struct PipelineOutput {
    pub split: SplitSummary,
    pub scaling: ScalingProfile,
    pub resampling: ResamplingSummary,
    pub search: SearchOutcome,
    /// Final model, fitted on the full resampled training set.
    pub model: Box<dyn ClassifierModel>,
    pub evaluation: EvaluationReport,
    /// `None` when attributions are disabled in the configuration.
    pub attributions: Option<AttributionSet>,
}

impl fmt::Debug for PipelineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOutput")
            .field("split", &self.split)
            .field("best", &self.search.best)
            .field("model", &self.model.name())
            .field("roc_auc", &self.evaluation.roc_auc)
            .field("attributions", &self.attributions.as_ref().map(|a| a.samples.len()))
            .finish()
    }
}

pub struct DisruptionPipeline {
    config: PipelineConfig,
}

impl DisruptionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        DisruptionPipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, dataset: &Dataset) -> Result<PipelineOutput> {
        let config = &self.config;
        if dataset.is_empty() {
            return Err(PipelineError::invalid_dataset(
                Component::Dataset,
                "dataset has no samples",
            ));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);

        let parts = split(dataset, config.split_ratio, &mut rng)?;
        let split_summary = SplitSummary {
            ratio: config.split_ratio,
            dataset: dataset.summary(),
            train: parts.train.summary(),
            holdout: parts.holdout.summary(),
        };
        info!(
            "Split {} samples: {} train / {} holdout",
            dataset.len(),
            parts.train.len(),
            parts.holdout.len()
        );

        let scaling = fit_scaler(&parts.train.x, &parts.train.feature_names, config.scaler_epsilon)?;
        let train_x = transform_all(&parts.train.x, &scaling)?;
        let holdout_x = transform_all(&parts.holdout.x, &scaling)?;
        info!("Fitted scaler on {} features", scaling.n_features());

        let resampled = resample(&train_x, &parts.train.y, config.smote_k, &mut rng)?;
        info!(
            "Oversampled training set: {} -> {} samples ({} synthetic)",
            resampled.summary.before.samples,
            resampled.summary.after.samples,
            resampled.summary.synthetic_samples
        );

        let options = SearchOptions {
            k_folds: config.k_folds,
            metric: config.ranking_metric,
            model: config.model.clone(),
            n_threads: config.n_threads,
        };
        info!(
            "Searching {} settings with {}-fold cross-validation ({})",
            config.grid.len(),
            config.k_folds,
            config.ranking_metric.name()
        );
        let outcome = search(&resampled.x, &resampled.y, &config.grid, &options, &mut rng)?;
        info!(
            "Best setting {:?} (mean {} {:.4})",
            outcome.best,
            config.ranking_metric.name(),
            outcome.best_score
        );

        let mut model = build_model(&config.model, outcome.best, rng.gen());
        let train_y = resampled.y.to_vec();
        model.fit(&resampled.x, &train_y)?;
        info!("Fitted final {} model", model.name());

        let evaluation = evaluate(model.as_ref(), &holdout_x, &parts.holdout.y)?;
        info!(
            "Holdout: accuracy {:.4}, ROC-AUC {:.4}, disruption recall {:.4}",
            evaluation.accuracy, evaluation.roc_auc, evaluation.positive_class.recall
        );

        let attributions = if config.explain {
            let set = explain(model.as_ref(), &holdout_x, &parts.holdout.feature_names)?;
            if let Some((name, value)) = set.ranked_features().first() {
                info!(
                    "Explained {} holdout samples; top feature '{}' (mean |attribution| {:.4})",
                    set.samples.len(),
                    name,
                    value
                );
            }
            Some(set)
        } else {
            None
        };

        Ok(PipelineOutput {
            split: split_summary,
            scaling,
            resampling: resampled.summary,
            search: outcome,
            model,
            evaluation,
            attributions,
        })
    }
}
