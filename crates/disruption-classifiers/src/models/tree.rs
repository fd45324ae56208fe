//! Regression trees fit to boosting residuals.
//!
//! Trees are stored as a flat node array (root at index 0). Split search runs
//! on per-feature quantile histograms built once per fit; a split on bin `b`
//! is stored as the raw threshold `edges[b]`, so `x <= threshold` at
//! prediction time routes a row exactly as its bin did during training.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Split feature; `None` for leaves.
    pub feature: Option<usize>,
    /// Rows with `x[feature] <= threshold` go left.
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Leaf output (unused on internal nodes).
    pub value: f64,
    /// Number of training rows that reached this node.
    pub cover: f64,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }

    fn leaf(value: f64, cover: f64) -> Self {
        TreeNode {
            feature: None,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
            cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Build a tree from an explicit node list.
    ///
    /// Node 0 is the root. Children must point inside the list and after
    /// their parent, which rules out cycles.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Option<Self> {
        if nodes.is_empty() {
            return None;
        }
        let n = nodes.len();
        let valid = nodes.iter().enumerate().all(|(idx, node)| {
            node.is_leaf()
                || (node.left > idx && node.right > idx && node.left < n && node.right < n)
        });
        valid.then_some(RegressionTree { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Leaf value reached by `row`.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            match node.feature {
                None => return node.value,
                Some(f) => {
                    idx = if row[f] <= node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value, i.e. the tree's expected output over
    /// the rows it was grown on.
    pub fn expected_value(&self) -> f64 {
        let root_cover = self.nodes[0].cover;
        if root_cover <= 0.0 {
            return 0.0;
        }
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.value * n.cover / root_cover)
            .sum()
    }
}

/// Quantile-binned copy of a feature matrix.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    /// Ascending upper bin edges per feature; the last edge is the column max.
    edges: Vec<Vec<f64>>,
    /// Column-major bin codes.
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub fn new(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let mut edges = Vec::with_capacity(x.ncols());
        let mut bins = Vec::with_capacity(x.ncols());

        for column in x.columns() {
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_unstable_by(f64::total_cmp);
            sorted.dedup();

            let col_edges: Vec<f64> = if sorted.len() <= max_bins {
                sorted
            } else {
                let n = sorted.len();
                let mut e: Vec<f64> = (1..=max_bins).map(|b| sorted[b * n / max_bins - 1]).collect();
                e.dedup();
                e
            };

            let codes = column
                .iter()
                .map(|v| col_edges.partition_point(|e| e < v) as u16)
                .collect();

            edges.push(col_edges);
            bins.push(codes);
        }

        BinnedMatrix { edges, bins }
    }

    pub fn n_features(&self) -> usize {
        self.edges.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len()
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grow a tree on `rows` of `binned`, fitting the gradients with squared
/// error splits and Newton-step leaves `sum(grad) / sum(hess)`.
pub fn grow_tree(
    binned: &BinnedMatrix,
    grad: &[f64],
    hess: &[f64],
    rows: &mut [usize],
    params: TreeParams,
) -> RegressionTree {
    let mut nodes = Vec::new();
    grow_node(binned, grad, hess, rows, params, 0, &mut nodes);
    RegressionTree { nodes }
}

fn newton_value(grad: &[f64], hess: &[f64], rows: &[usize]) -> f64 {
    let numerator: f64 = rows.iter().map(|&i| grad[i]).sum();
    let denominator: f64 = rows.iter().map(|&i| hess[i]).sum();
    if denominator.abs() < 1e-150 {
        0.0
    } else {
        numerator / denominator
    }
}

fn grow_node(
    binned: &BinnedMatrix,
    grad: &[f64],
    hess: &[f64],
    rows: &mut [usize],
    params: TreeParams,
    depth: usize,
    nodes: &mut Vec<TreeNode>,
) -> usize {
    let node_idx = nodes.len();
    let cover = rows.len() as f64;
    nodes.push(TreeNode::leaf(newton_value(grad, hess, rows), cover));

    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || rows.len() < 2 * min_leaf {
        return node_idx;
    }

    let Some(best) = find_best_split(binned, grad, rows, min_leaf) else {
        return node_idx;
    };

    // Partition rows in place: bin <= best.bin to the front.
    let codes = &binned.bins[best.feature];
    let mut mid = 0;
    for i in 0..rows.len() {
        if codes[rows[i]] as usize <= best.bin {
            rows.swap(i, mid);
            mid += 1;
        }
    }

    let (left_rows, right_rows) = rows.split_at_mut(mid);
    let left = grow_node(binned, grad, hess, left_rows, params, depth + 1, nodes);
    let right = grow_node(binned, grad, hess, right_rows, params, depth + 1, nodes);

    let node = &mut nodes[node_idx];
    node.feature = Some(best.feature);
    node.threshold = binned.edges[best.feature][best.bin];
    node.left = left;
    node.right = right;
    node_idx
}

fn find_best_split(
    binned: &BinnedMatrix,
    grad: &[f64],
    rows: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| grad[i]).sum();
    let parent_score = total * total / n as f64;

    let mut best: Option<SplitCandidate> = None;
    for feature in 0..binned.n_features() {
        let n_bins = binned.n_bins(feature);
        if n_bins < 2 {
            continue;
        }
        let codes = &binned.bins[feature];
        let mut counts = vec![0usize; n_bins];
        let mut sums = vec![0.0f64; n_bins];
        for &i in rows {
            let b = codes[i] as usize;
            counts[b] += 1;
            sums[b] += grad[i];
        }

        let mut n_left = 0usize;
        let mut sum_left = 0.0f64;
        for bin in 0..n_bins - 1 {
            n_left += counts[bin];
            sum_left += sums[bin];
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            if counts[bin] == 0 && bin > 0 {
                // Same partition as the previous bin.
                continue;
            }
            let sum_right = total - sum_left;
            let gain = sum_left * sum_left / n_left as f64 + sum_right * sum_right / n_right as f64
                - parent_score;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate { feature, bin, gain });
            }
        }
    }
    best
}
