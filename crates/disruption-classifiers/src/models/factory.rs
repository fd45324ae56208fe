use crate::config::{ModelType, ParameterSetting};
use crate::models::boosted::BoostedTreesClassifier;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::GbdtClassifier;

/// Build an unfitted classifier for `setting`.
///
/// `seed` drives the per-stage row subsampling of the native model, so two
/// models built with the same arguments fit identically.
pub fn build_model(model_type: &ModelType, setting: ParameterSetting, seed: u64) -> Box<dyn ClassifierModel> {
    match model_type {
        ModelType::BoostedTrees {
            max_bins,
            min_samples_leaf,
        } => Box::new(BoostedTreesClassifier::new(
            setting,
            *max_bins,
            *min_samples_leaf,
            seed,
        )),
        ModelType::Gbdt {
            training_optimization_level,
            loss_type,
        } => Box::new(GbdtClassifier::new(
            setting,
            *training_optimization_level,
            loss_type.clone(),
        )),
    }
}
