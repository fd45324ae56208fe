pub mod boosted;
pub mod gbdt;
pub mod tree;

pub mod classifier_trait;
pub mod factory;

pub use boosted::{BoostedTreesClassifier, TreeEnsemble};
pub use classifier_trait::ClassifierModel;
pub use factory::build_model;
