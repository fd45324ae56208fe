use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::ParameterSetting;
use crate::error::{Component, PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Gradient Boosting Decision Tree (GBDT) classifier backed by the `gbdt`
/// crate.
///
/// The fitted trees are opaque, so this backend cannot be explained. Row
/// subsampling inside `gbdt` draws from its own unseeded generator.
pub struct GbdtClassifier {
    model: Option<GBDT>,
    setting: ParameterSetting,
    training_optimization_level: u8,
    loss_type: String,
    n_features: usize,
}

impl GbdtClassifier {
    pub fn new(setting: ParameterSetting, training_optimization_level: u8, loss_type: String) -> Self {
        GbdtClassifier {
            model: None,
            setting,
            training_optimization_level,
            loss_type,
            n_features: 0,
        }
    }

    fn to_data_vec(x: &Array2<f64>) -> DataVec {
        let mut data = DataVec::new();
        for row in x.rows() {
            let features: Vec<ValueType> = row.iter().map(|&v| v as ValueType).collect();
            data.push(Data::new_test_data(features, None));
        }
        data
    }
}

impl ClassifierModel for GbdtClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        self.setting.validate(Component::ClassifierModel)?;
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PipelineError::invalid_dataset(
                Component::ClassifierModel,
                format!("{} rows but {} labels", x.nrows(), y.len()),
            ));
        }
        let feature_size = x.ncols();

        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.setting.learning_rate as ValueType);
        config.set_max_depth(self.setting.max_depth as u32);
        config.set_iterations(self.setting.n_estimators);
        config.set_data_sample_ratio(self.setting.subsample);
        config.set_debug(false);
        config.set_training_optimization_level(self.training_optimization_level);
        config.set_loss(&self.loss_type);

        let mut gbdt = GBDT::new(&config);

        // LogLikelyhood expects labels in {-1, 1}
        let mut train_x = DataVec::new();
        for (row, &label) in x.rows().into_iter().zip(y) {
            let features: Vec<ValueType> = row.iter().map(|&v| v as ValueType).collect();
            let target = if label == 1 { 1.0 } else { -1.0 };
            train_x.push(Data::new_training_data(features, 1.0, target, None));
        }

        gbdt.fit(&mut train_x);

        self.model = Some(gbdt);
        self.n_features = feature_size;
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| {
                let p = p.clamp(1e-12, 1.0 - 1e-12);
                (p / (1.0 - p)).ln()
            })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or_else(|| PipelineError::NotFitted {
            component: Component::ClassifierModel,
            model: self.name().to_string(),
        })?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::invalid_dataset(
                Component::ClassifierModel,
                format!("model expects {} features, got {}", self.n_features, x.ncols()),
            ));
        }
        let test_x = Self::to_data_vec(x);
        let predictions = model.predict(&test_x);
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
