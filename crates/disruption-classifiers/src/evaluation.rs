use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Component, PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::stats::{average_precision, roc_auc, roc_curve, RocPoint};

/// Rows are the true label, columns the predicted label. Serialised as the
/// 2x2 grid `[[TN, FP], [FN, TP]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[[usize; 2]; 2]", from = "[[usize; 2]; 2]")]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = ConfusionMatrix {
            true_negatives: 0,
            false_positives: 0,
            false_negatives: 0,
            true_positives: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (0, 0) => cm.true_negatives += 1,
                (0, _) => cm.false_positives += 1,
                (_, 0) => cm.false_negatives += 1,
                _ => cm.true_positives += 1,
            }
        }
        cm
    }

    /// `[[TN, FP], [FN, TP]]`
    pub fn as_matrix(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }
}

impl From<ConfusionMatrix> for [[usize; 2]; 2] {
    fn from(cm: ConfusionMatrix) -> Self {
        cm.as_matrix()
    }
}

impl From<[[usize; 2]; 2]> for ConfusionMatrix {
    fn from([[tn, fp], [fn_, tp]]: [[usize; 2]; 2]) -> Self {
        ConfusionMatrix {
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
            true_positives: tp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassMetrics {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Precision/recall/F1 averaged over the two classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model: String,
    pub confusion_matrix: ConfusionMatrix,
    /// Class 0 (no disruption).
    pub negative_class: ClassMetrics,
    /// Class 1 (disruption).
    pub positive_class: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub roc_auc: f64,
    pub average_precision: f64,
    pub roc_curve: Vec<RocPoint>,
}

/// Score a fitted model on the holdout split.
///
/// Probabilities are computed once; hard labels are `p >= 0.5`.
pub fn evaluate(model: &dyn ClassifierModel, x: &Array2<f64>, y: &Array1<u8>) -> Result<EvaluationReport> {
    if x.nrows() != y.len() || y.is_empty() {
        return Err(PipelineError::invalid_dataset(
            Component::Evaluator,
            format!("{} feature rows but {} labels", x.nrows(), y.len()),
        ));
    }
    let y_true = y.to_vec();
    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    if n_pos == 0 || n_pos == y_true.len() {
        return Err(PipelineError::SingleClassHoldout);
    }

    let proba = model.predict_proba(x)?;
    let y_pred: Vec<u8> = proba.iter().map(|&p| u8::from(p >= 0.5)).collect();

    let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
    let positive_class = ClassMetrics::from_counts(cm.true_positives, cm.false_positives, cm.false_negatives);
    let negative_class = ClassMetrics::from_counts(cm.true_negatives, cm.false_negatives, cm.false_positives);

    let total = cm.total() as f64;
    let accuracy = (cm.true_positives + cm.true_negatives) as f64 / total;

    let macro_avg = AveragedMetrics {
        precision: (negative_class.precision + positive_class.precision) / 2.0,
        recall: (negative_class.recall + positive_class.recall) / 2.0,
        f1: (negative_class.f1 + positive_class.f1) / 2.0,
    };
    let (w_neg, w_pos) = (
        negative_class.support as f64 / total,
        positive_class.support as f64 / total,
    );
    let weighted_avg = AveragedMetrics {
        precision: w_neg * negative_class.precision + w_pos * positive_class.precision,
        recall: w_neg * negative_class.recall + w_pos * positive_class.recall,
        f1: w_neg * negative_class.f1 + w_pos * positive_class.f1,
    };

    let roc_curve = roc_curve(&proba, &y_true).ok_or(PipelineError::SingleClassHoldout)?;
    let roc_auc = roc_auc(&proba, &y_true).ok_or(PipelineError::SingleClassHoldout)?;
    let average_precision = average_precision(&proba, &y_true).ok_or(PipelineError::SingleClassHoldout)?;

    log::debug!(
        "Holdout confusion matrix {:?}, ROC-AUC {:.4}",
        cm.as_matrix(),
        roc_auc
    );

    Ok(EvaluationReport {
        model: model.name().to_string(),
        confusion_matrix: cm,
        negative_class,
        positive_class,
        accuracy,
        macro_avg,
        weighted_avg,
        roc_auc,
        average_precision,
        roc_curve,
    })
}
