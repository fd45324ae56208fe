//! Gradient-boosted decision trees for binary classification.
//!
//! Stage-wise additive model on the binomial deviance:
//! - the initial raw score is the log-odds of the training positive rate,
//! - each stage fits a regression tree to the negative gradient `y - p` on a
//!   row subsample, with Newton-step leaf values,
//! - the tree output scaled by the learning rate is added to every row.
//!
//! `predict_proba` is the sigmoid of the summed raw score.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{ModelType, ParameterSetting};
use crate::error::{Component, PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::tree::{grow_tree, BinnedMatrix, RegressionTree, TreeParams};
use crate::stats::sigmoid;

/// Fitted boosted ensemble: `base_score + learning_rate * sum(trees)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub base_score: f64,
    pub learning_rate: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    /// Raw (log-odds) output for one row.
    pub fn decision_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    /// Cover-weighted expected raw output over the training rows.
    pub fn expected_value(&self) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.expected_value()).sum::<f64>()
    }
}

pub struct BoostedTreesClassifier {
    setting: ParameterSetting,
    max_bins: usize,
    min_samples_leaf: usize,
    seed: u64,
    ensemble: Option<TreeEnsemble>,
}

impl BoostedTreesClassifier {
    pub fn new(setting: ParameterSetting, max_bins: usize, min_samples_leaf: usize, seed: u64) -> Self {
        BoostedTreesClassifier {
            setting,
            max_bins,
            min_samples_leaf,
            seed,
            ensemble: None,
        }
    }

    pub fn setting(&self) -> &ParameterSetting {
        &self.setting
    }

    fn fitted(&self) -> Result<&TreeEnsemble> {
        self.ensemble.as_ref().ok_or_else(|| PipelineError::NotFitted {
            component: Component::ClassifierModel,
            model: self.name().to_string(),
        })
    }
}

fn binomial_deviance(y: &[f64], raw: &[f64]) -> f64 {
    let n = y.len() as f64;
    y.iter()
        .zip(raw)
        .map(|(&yi, &f)| {
            // log(1 + exp(f)) - y f, stable for large |f|
            let softplus = if f > 0.0 { f + (-f).exp().ln_1p() } else { f.exp().ln_1p() };
            softplus - yi * f
        })
        .sum::<f64>()
        / n
}

impl ClassifierModel for BoostedTreesClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        self.setting.validate(Component::ClassifierModel)?;
        ModelType::BoostedTrees {
            max_bins: self.max_bins,
            min_samples_leaf: self.min_samples_leaf,
        }
        .validate(Component::ClassifierModel)?;

        let n_samples = x.nrows();
        if n_samples == 0 || n_samples != y.len() {
            return Err(PipelineError::invalid_dataset(
                Component::ClassifierModel,
                format!("{} rows but {} labels", n_samples, y.len()),
            ));
        }
        let n_pos = y.iter().filter(|&&l| l == 1).count();
        if n_pos == 0 || n_pos == n_samples {
            return Err(PipelineError::invalid_dataset(
                Component::ClassifierModel,
                "training labels contain a single class",
            ));
        }

        let setting = self.setting;
        let targets: Vec<f64> = y.iter().map(|&l| f64::from(l)).collect();
        let prior = n_pos as f64 / n_samples as f64;
        let base_score = (prior / (1.0 - prior)).ln();

        let binned = BinnedMatrix::new(x, self.max_bins);
        let row_vecs: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let params = TreeParams {
            max_depth: setting.max_depth,
            min_samples_leaf: self.min_samples_leaf,
        };
        let n_inbag = if setting.subsample < 1.0 {
            ((setting.subsample * n_samples as f64) as usize).max(1)
        } else {
            n_samples
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut raw = vec![base_score; n_samples];
        let mut grad = vec![0.0; n_samples];
        let mut hess = vec![0.0; n_samples];
        let mut all_rows: Vec<usize> = (0..n_samples).collect();
        let mut trees = Vec::with_capacity(setting.n_estimators);

        for stage in 0..setting.n_estimators {
            for i in 0..n_samples {
                let p = sigmoid(raw[i]);
                grad[i] = targets[i] - p;
                hess[i] = p * (1.0 - p);
            }

            let rows = if n_inbag < n_samples {
                all_rows.shuffle(&mut rng);
                &mut all_rows[..n_inbag]
            } else {
                &mut all_rows[..]
            };

            let tree = grow_tree(&binned, &grad, &hess, rows, params);
            for (i, row) in row_vecs.iter().enumerate() {
                raw[i] += setting.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);

            if log::log_enabled!(log::Level::Trace) && (stage + 1) % 50 == 0 {
                log::trace!(
                    "Stage {}/{}: train deviance {:.5}",
                    stage + 1,
                    setting.n_estimators,
                    binomial_deviance(&targets, &raw)
                );
            }
        }

        self.ensemble = Some(TreeEnsemble {
            base_score,
            learning_rate: setting.learning_rate,
            n_features: x.ncols(),
            trees,
        });
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let ensemble = self.fitted()?;
        if x.ncols() != ensemble.n_features {
            return Err(PipelineError::invalid_dataset(
                Component::ClassifierModel,
                format!(
                    "model expects {} features, got {}",
                    ensemble.n_features,
                    x.ncols()
                ),
            ));
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| ensemble.decision_row(&row.to_vec()))
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.ensemble.is_some()
    }

    fn tree_ensemble(&self) -> Option<&TreeEnsemble> {
        self.ensemble.as_ref()
    }

    fn name(&self) -> &str {
        "boosted_trees"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::roc_auc;
    use rand::Rng;

    fn separable(n: usize, seed: u64) -> (Array2<f64>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 3));
        let mut y = Vec::with_capacity(n);
        for r in 0..n {
            let label = u8::from(r % 4 == 0);
            x[(r, 0)] = rng.gen::<f64>() + if label == 1 { 1.5 } else { 0.0 };
            x[(r, 1)] = rng.gen::<f64>();
            x[(r, 2)] = rng.gen::<f64>() * 0.1 + x[(r, 0)] * 0.2;
            y.push(label);
        }
        (x, y)
    }

    fn setting() -> ParameterSetting {
        ParameterSetting {
            learning_rate: 0.1,
            max_depth: 3,
            n_estimators: 30,
            subsample: 0.8,
        }
    }

    #[test]
    fn unfitted_model_errors() {
        let model = BoostedTreesClassifier::new(setting(), 255, 1, 0);
        let x = Array2::zeros((2, 3));
        match model.predict_proba(&x) {
            Err(PipelineError::NotFitted { .. }) => {}
            other => panic!("expected NotFitted, got {:?}", other),
        }
        assert!(!model.is_fitted());
        assert!(model.tree_ensemble().is_none());
    }

    #[test]
    fn learns_separable_data() {
        let (x, y) = separable(200, 1);
        let mut model = BoostedTreesClassifier::new(setting(), 255, 1, 42);
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(roc_auc(&probs, &y).unwrap() > 0.95);

        let labels = model.predict(&x).unwrap();
        let correct = labels.iter().zip(&y).filter(|(a, b)| a == b).count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn same_seed_same_ensemble() {
        let (x, y) = separable(120, 3);
        let mut a = BoostedTreesClassifier::new(setting(), 32, 1, 9);
        let mut b = BoostedTreesClassifier::new(setting(), 32, 1, 9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.tree_ensemble(), b.tree_ensemble());
    }

    #[test]
    fn zero_stages_predicts_prior() {
        let (x, y) = separable(40, 5);
        let mut model = BoostedTreesClassifier::new(
            ParameterSetting {
                n_estimators: 0,
                ..setting()
            },
            255,
            1,
            0,
        );
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        // r % 4 == 0 → 10 positives of 40
        assert!(probs.iter().all(|p| (p - 0.25).abs() < 1e-12));
    }

    #[test]
    fn single_class_training_is_rejected() {
        let x = Array2::zeros((4, 3));
        let mut model = BoostedTreesClassifier::new(setting(), 255, 1, 0);
        assert!(model.fit(&x, &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn expected_value_is_mean_raw_output_without_subsampling() {
        let (x, y) = separable(100, 11);
        let mut model = BoostedTreesClassifier::new(
            ParameterSetting {
                subsample: 1.0,
                ..setting()
            },
            255,
            1,
            0,
        );
        model.fit(&x, &y).unwrap();
        let raw = model.decision_function(&x).unwrap();
        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let expected = model.tree_ensemble().unwrap().expected_value();
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_settings_are_rejected_before_fitting() {
        let (x, y) = separable(40, 13);
        let bad = [
            ParameterSetting { subsample: 0.0, ..setting() },
            ParameterSetting { subsample: 2.0, ..setting() },
            ParameterSetting { subsample: f64::NAN, ..setting() },
            ParameterSetting { learning_rate: -0.5, ..setting() },
            ParameterSetting { learning_rate: f64::NAN, ..setting() },
        ];
        for s in bad {
            let mut model = BoostedTreesClassifier::new(s, 255, 1, 0);
            match model.fit(&x, &y) {
                Err(PipelineError::InvalidParameter { component, .. }) => {
                    assert_eq!(component, Component::ClassifierModel)
                }
                other => panic!("expected InvalidParameter for {:?}, got {:?}", s, other),
            }
            assert!(!model.is_fitted());
        }

        let mut one_bin = BoostedTreesClassifier::new(setting(), 1, 1, 0);
        assert!(matches!(
            one_bin.fit(&x, &y),
            Err(PipelineError::InvalidParameter { ref parameter, .. }) if parameter == "max_bins"
        ));
    }
}
