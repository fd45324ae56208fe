//! Additive per-feature attributions for tree ensembles (path-dependent
//! TreeSHAP).
//!
//! For one tree, the attribution of feature `i` on row `x` is its Shapley
//! value for the game `v(S) = E[f(x) | x_S]`, where the expectation over the
//! features outside `S` follows the training cover of each branch. The
//! polynomial-time recursion tracks, along the current root-to-node path,
//! the proportion of all feature subsets that flow through it.
//!
//! Ensemble attributions are the per-tree values scaled by the learning
//! rate, and `baseline + sum(values) == raw output` for every row.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Component, PipelineError, Result};
use crate::models::boosted::TreeEnsemble;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::tree::RegressionTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAttribution {
    /// One value per feature, in schema order.
    pub values: Vec<f64>,
    /// Model output (log-odds) for this row.
    pub raw_output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionSet {
    pub feature_names: Vec<String>,
    /// Expected raw output of the model over its training cover.
    pub baseline: f64,
    pub samples: Vec<SampleAttribution>,
    /// Mean absolute attribution per feature (global importance).
    pub mean_abs: Vec<f64>,
}

impl AttributionSet {
    /// Feature names with their mean |attribution|, most important first.
    pub fn ranked_features(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.mean_abs.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Largest |baseline + sum(values) - raw_output| over all samples.
    pub fn max_additivity_error(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| (self.baseline + s.values.iter().sum::<f64>() - s.raw_output).abs())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

/// Undo the extension that added `path[index]`, removing it from the path.
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - fi));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight the path would have with `path[index]` unwound.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let fi = i as f64;
            let tmp = next_one_portion / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (d - fi);
        }
    } else if zero_fraction != 0.0 {
        for i in (0..depth).rev() {
            let fi = i as f64;
            total += path[i].pweight / (zero_fraction * (d - fi));
        }
    }
    total * (d + 1.0)
}

struct TreeShap<'a> {
    tree: &'a RegressionTree,
    row: &'a [f64],
}

impl TreeShap<'_> {
    fn recurse(
        &self,
        phi: &mut [f64],
        node_index: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);
        let node = &self.tree.nodes()[node_index];

        let split = match node.feature {
            None => {
                for i in 1..path.len() {
                    let weight = unwound_path_sum(&path, i);
                    let el = path[i];
                    if let Some(f) = el.feature {
                        phi[f] += weight * (el.one_fraction - el.zero_fraction) * node.value;
                    }
                }
                return;
            }
            Some(f) => f,
        };

        let (hot, cold) = if self.row[split] <= node.threshold {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        let nodes = self.tree.nodes();
        let (hot_fraction, cold_fraction) = if node.cover > 0.0 {
            (nodes[hot].cover / node.cover, nodes[cold].cover / node.cover)
        } else {
            (0.5, 0.5)
        };

        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(index) = path.iter().position(|el| el.feature == Some(split)) {
            incoming_zero = path[index].zero_fraction;
            incoming_one = path[index].one_fraction;
            unwind_path(&mut path, index);
        }

        self.recurse(
            phi,
            hot,
            path.clone(),
            hot_fraction * incoming_zero,
            incoming_one,
            Some(split),
        );
        self.recurse(phi, cold, path, cold_fraction * incoming_zero, 0.0, Some(split));
    }
}

/// Shapley values of one tree's output for `row`.
///
/// The values sum to `tree.predict_row(row) - tree.expected_value()`.
pub fn tree_shap(tree: &RegressionTree, row: &[f64], n_features: usize) -> Vec<f64> {
    let mut phi = vec![0.0; n_features];
    let walker = TreeShap { tree, row };
    walker.recurse(&mut phi, 0, Vec::new(), 1.0, 1.0, None);
    phi
}

fn explain_row(ensemble: &TreeEnsemble, row: &[f64]) -> SampleAttribution {
    let mut values = vec![0.0; ensemble.n_features];
    for tree in &ensemble.trees {
        for (v, p) in values.iter_mut().zip(tree_shap(tree, row, ensemble.n_features)) {
            *v += ensemble.learning_rate * p;
        }
    }
    SampleAttribution {
        values,
        raw_output: ensemble.decision_row(row),
    }
}

/// Attribute the model's raw output on every row of `x` to its features.
pub fn explain(model: &dyn ClassifierModel, x: &Array2<f64>, feature_names: &[String]) -> Result<AttributionSet> {
    if !model.is_fitted() {
        return Err(PipelineError::NotFitted {
            component: Component::Explainer,
            model: model.name().to_string(),
        });
    }
    let ensemble = model
        .tree_ensemble()
        .ok_or_else(|| PipelineError::ExplainerUnsupportedModel {
            model: model.name().to_string(),
        })?;
    if x.ncols() != ensemble.n_features || feature_names.len() != ensemble.n_features {
        return Err(PipelineError::invalid_dataset(
            Component::Explainer,
            format!(
                "model expects {} features, got {} columns and {} names",
                ensemble.n_features,
                x.ncols(),
                feature_names.len()
            ),
        ));
    }

    let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
    let samples: Vec<SampleAttribution> = rows.par_iter().map(|row| explain_row(ensemble, row)).collect();

    let mut mean_abs = vec![0.0; ensemble.n_features];
    if !samples.is_empty() {
        for sample in &samples {
            for (m, v) in mean_abs.iter_mut().zip(&sample.values) {
                *m += v.abs();
            }
        }
        let n = samples.len() as f64;
        mean_abs.iter_mut().for_each(|m| *m /= n);
    }

    let set = AttributionSet {
        feature_names: feature_names.to_vec(),
        baseline: ensemble.expected_value(),
        samples,
        mean_abs,
    };
    log::debug!(
        "Explained {} samples, max additivity error {:.3e}",
        set.samples.len(),
        set.max_additivity_error()
    );
    Ok(set)
}
