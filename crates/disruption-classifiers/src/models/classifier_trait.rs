use ndarray::Array2;

use crate::error::Result;
use crate::models::boosted::TreeEnsemble;
use crate::stats::sigmoid;

/// Contract shared by every binary classifier the pipeline can train.
///
/// Labels use the 0/1 convention (1 = disruption). Every prediction method
/// fails with `NotFitted` until `fit` has succeeded, and a fitted model is
/// never mutated by prediction.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model on rows of `x` with labels `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()>;

    /// Raw ensemble output (log-odds) per row.
    fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Probability of the positive class per row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(sigmoid)
            .collect())
    }

    /// Hard labels, positive when the probability is at least 0.5.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect())
    }

    fn is_fitted(&self) -> bool;

    /// Tree structure for attribution, when the model exposes one.
    fn tree_ensemble(&self) -> Option<&TreeEnsemble> {
        None
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
