use serde::{Deserialize, Serialize};

/// Ranking metric used to score probabilities against 0/1 labels.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    RocAuc,
    AveragePrecision,
}

impl RankingMetric {
    /// Score `scores` against `labels`. `None` when the labels hold a single
    /// class and the metric is undefined, or when the lengths differ.
    pub fn score(&self, scores: &[f64], labels: &[u8]) -> Option<f64> {
        match self {
            RankingMetric::RocAuc => roc_auc(scores, labels),
            RankingMetric::AveragePrecision => average_precision(scores, labels),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankingMetric::RocAuc => "roc_auc",
            RankingMetric::AveragePrecision => "average_precision",
        }
    }
}

/// One operating point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// Cumulative (threshold, true positives, false positives) at every distinct
/// score, highest score first. Tied scores collapse into a single step.
fn threshold_steps(scores: &[f64], labels: &[u8]) -> Vec<(f64, usize, usize)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut steps = Vec::new();
    let mut tp = 0usize;
    let mut fp = 0usize;
    for (pos, &idx) in order.iter().enumerate() {
        if labels[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_group = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_group {
            steps.push((scores[idx], tp, fp));
        }
    }
    steps
}

/// `None` when the inputs differ in length or hold a single class.
fn class_counts(scores: &[f64], labels: &[u8]) -> Option<(usize, usize)> {
    if scores.len() != labels.len() {
        return None;
    }
    let pos = labels.iter().filter(|&&l| l == 1).count();
    let neg = labels.len() - pos;
    (pos > 0 && neg > 0).then_some((pos, neg))
}

/// ROC curve across all distinct thresholds, starting at (0, 0).
pub fn roc_curve(scores: &[f64], labels: &[u8]) -> Option<Vec<RocPoint>> {
    let (total_pos, total_neg) = class_counts(scores, labels)?;

    let steps = threshold_steps(scores, labels);
    // Origin threshold: one above the highest score
    let mut points = vec![RocPoint {
        threshold: steps.first().map_or(1.0, |s| s.0 + 1.0),
        fpr: 0.0,
        tpr: 0.0,
    }];
    for (threshold, tp, fp) in steps {
        points.push(RocPoint {
            threshold,
            fpr: fp as f64 / total_neg as f64,
            tpr: tp as f64 / total_pos as f64,
        });
    }
    Some(points)
}

/// Area under the ROC curve using the trapezoidal rule.
///
/// Equals the probability that a random positive is ranked above a random
/// negative, counting ties as one half.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let points = roc_curve(scores, labels)?;
    let auc = points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum();
    Some(auc)
}

/// Average precision: precision at each threshold weighted by the recall
/// increment since the previous threshold.
pub fn average_precision(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let (total_pos, _) = class_counts(scores, labels)?;

    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for (_, tp, fp) in threshold_steps(scores, labels) {
        let recall = tp as f64 / total_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Some(ap)
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
