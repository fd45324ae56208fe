use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Dataset,
    Splitter,
    Scaler,
    ImbalanceCorrector,
    HyperparameterSearchEngine,
    ClassifierModel,
    Evaluator,
    Explainer,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Component::Dataset => "Dataset",
            Component::Splitter => "Splitter",
            Component::Scaler => "Scaler",
            Component::ImbalanceCorrector => "ImbalanceCorrector",
            Component::HyperparameterSearchEngine => "HyperparameterSearchEngine",
            Component::ClassifierModel => "ClassifierModel",
            Component::Evaluator => "Evaluator",
            Component::Explainer => "Explainer",
        };
        f.write_str(name)
    }
}

/// Precondition violations raised by the pipeline components.
///
/// None of these are transient: a run that hits one of them is aborted and
/// no partial report is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("[{component}] invalid dataset: {reason}")]
    InvalidDataset { component: Component, reason: String },

    #[error("[{component}] invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        component: Component,
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("[Splitter] split ratio {0} is outside the open interval (0, 1)")]
    InvalidRatio(f64),

    #[error("[Scaler] feature '{feature}' has zero variance in the training split")]
    DegenerateFeature { feature: String },

    #[error("[ImbalanceCorrector] found {found} minority samples, need at least {required} (k + 1)")]
    InsufficientMinoritySamples { found: usize, required: usize },

    #[error("[HyperparameterSearchEngine] parameter grid has no candidates")]
    EmptyGrid,

    #[error("[HyperparameterSearchEngine] cannot build {k_folds} stratified folds when the smallest class has {smallest_class} samples")]
    InvalidFoldCount { k_folds: usize, smallest_class: usize },

    #[error("[HyperparameterSearchEngine] fold {fold} does not contain both classes")]
    DegenerateFold { fold: usize },

    #[error("[{component}] model '{model}' has not been fitted")]
    NotFitted { component: Component, model: String },

    #[error("[Evaluator] holdout labels contain a single class; ROC-AUC is undefined")]
    SingleClassHoldout,

    #[error("[Explainer] model '{model}' has no compatible attribution algorithm")]
    ExplainerUnsupportedModel { model: String },
}

impl PipelineError {
    /// Component that raised the error.
    pub fn component(&self) -> Component {
        match self {
            PipelineError::InvalidDataset { component, .. } => *component,
            PipelineError::InvalidParameter { component, .. } => *component,
            PipelineError::InvalidRatio(_) => Component::Splitter,
            PipelineError::DegenerateFeature { .. } => Component::Scaler,
            PipelineError::InsufficientMinoritySamples { .. } => Component::ImbalanceCorrector,
            PipelineError::EmptyGrid
            | PipelineError::InvalidFoldCount { .. }
            | PipelineError::DegenerateFold { .. } => Component::HyperparameterSearchEngine,
            PipelineError::NotFitted { component, .. } => *component,
            PipelineError::SingleClassHoldout => Component::Evaluator,
            PipelineError::ExplainerUnsupportedModel { .. } => Component::Explainer,
        }
    }

    pub(crate) fn invalid_parameter(
        component: Component,
        parameter: &str,
        value: impl fmt::Display,
        reason: &str,
    ) -> Self {
        PipelineError::InvalidParameter {
            component,
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_dataset(component: Component, reason: impl Into<String>) -> Self {
        PipelineError::InvalidDataset {
            component,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
