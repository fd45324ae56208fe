//! Labeled dataset container and the train/holdout splitter.
//!
//! `Dataset` keeps the feature matrix, the 0/1 labels and the ordered feature
//! names together so every row-wise operation (splitting, selecting,
//! resampling) moves them as one unit.
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Component, PipelineError, Result};

/// Canonical diagnostic measurements, in schema order.
pub const FEATURE_NAMES: [&str; 9] = [
    "Plasma Current",
    "Electron Density",
    "Magnetic Field",
    "Plasma Pressure",
    "Radiated Power",
    "Edge Safety Factor",
    "Energy Confinement Time",
    "Temperature Gradient",
    "Turbulence Level",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<u8>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset, validating shape, label domain and finiteness.
    pub fn new(x: Array2<f64>, y: Array1<u8>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(PipelineError::invalid_dataset(
                Component::Dataset,
                format!("{} feature rows but {} labels", x.nrows(), y.len()),
            ));
        }
        if x.ncols() != feature_names.len() {
            return Err(PipelineError::invalid_dataset(
                Component::Dataset,
                format!(
                    "{} feature columns but {} feature names",
                    x.ncols(),
                    feature_names.len()
                ),
            ));
        }
        if let Some(pos) = y.iter().position(|&label| label > 1) {
            return Err(PipelineError::invalid_dataset(
                Component::Dataset,
                format!("label {} at row {} is not 0 or 1", y[pos], pos),
            ));
        }
        if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::invalid_dataset(
                Component::Dataset,
                format!("non-finite value in '{}' at row {}", feature_names[col], row),
            ));
        }
        Ok(Dataset { x, y, feature_names })
    }

    /// Build a dataset with the canonical nine-measurement schema.
    pub fn with_canonical_schema(x: Array2<f64>, y: Array1<u8>) -> Result<Self> {
        let names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        Dataset::new(x, y, names)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn n_positive(&self) -> usize {
        self.y.iter().filter(|&&v| v == 1).count()
    }

    pub fn n_negative(&self) -> usize {
        self.len() - self.n_positive()
    }

    /// New dataset holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    pub fn summary(&self) -> ClassBalance {
        ClassBalance {
            samples: self.len(),
            positives: self.n_positive(),
            negatives: self.n_negative(),
        }
    }
}

/// Sample and class counts of a dataset or split side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBalance {
    pub samples: usize,
    pub positives: usize,
    pub negatives: usize,
}

/// Disjoint train/holdout partition of a dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub holdout: Dataset,
    /// Row indices of the source dataset that went to each side.
    pub train_indices: Vec<usize>,
    pub holdout_indices: Vec<usize>,
}

/// Randomly partition `dataset` into train and holdout sets.
///
/// Row indices are shuffled with `rng` and the first `floor(ratio * n)` rows
/// go to train. The input dataset is left untouched.
pub fn split<R: Rng + ?Sized>(dataset: &Dataset, ratio: f64, rng: &mut R) -> Result<Split> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(PipelineError::InvalidRatio(ratio));
    }

    let n_samples = dataset.len();
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);

    let n_train = (n_samples as f64 * ratio) as usize;
    if n_train == 0 || n_train == n_samples {
        return Err(PipelineError::invalid_dataset(
            Component::Splitter,
            format!(
                "ratio {} on {} samples leaves an empty partition",
                ratio, n_samples
            ),
        ));
    }

    let holdout_indices = indices.split_off(n_train);
    let train_indices = indices;

    let train = dataset.select_rows(&train_indices);
    let holdout = dataset.select_rows(&holdout_indices);

    log::debug!(
        "Split {} samples into {} train ({} positive) and {} holdout ({} positive)",
        n_samples,
        train.len(),
        train.n_positive(),
        holdout.len(),
        holdout.n_positive()
    );

    Ok(Split {
        train,
        holdout,
        train_indices,
        holdout_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 2), |(r, c)| (r * 2 + c) as f64);
        let y = Array1::from_shape_fn(n, |r| u8::from(r % 5 == 0));
        Dataset::new(x, y, vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn rejects_bad_labels() {
        let x = Array2::zeros((2, 1));
        let y = Array1::from_vec(vec![0u8, 2]);
        let err = Dataset::new(x, y, vec!["a".into()]).unwrap_err();
        assert_eq!(err.component(), Component::Dataset);
    }

    #[test]
    fn rejects_non_finite() {
        let mut x = Array2::zeros((2, 1));
        x[(1, 0)] = f64::NAN;
        let y = Array1::from_vec(vec![0u8, 1]);
        assert!(Dataset::new(x, y, vec!["a".into()]).is_err());
    }

    #[test]
    fn canonical_schema_requires_nine_columns() {
        let x = Array2::zeros((3, 8));
        let y = Array1::zeros(3);
        assert!(Dataset::with_canonical_schema(x, y).is_err());
        let x = Array2::zeros((3, 9));
        let y = Array1::zeros(3);
        assert!(Dataset::with_canonical_schema(x, y).is_ok());
    }

    #[test]
    fn split_is_disjoint_and_complete() {
        let data = toy(103);
        let mut rng = StdRng::seed_from_u64(42);
        let split = split(&data, 0.8, &mut rng).unwrap();
        assert_eq!(split.train.len(), 82);
        assert_eq!(split.holdout.len(), 21);

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.holdout_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..103).collect::<Vec<_>>());

        // Rows follow their indices
        let first = split.train_indices[0];
        assert_eq!(split.train.x.row(0), data.x.row(first));
        assert_eq!(split.train.y[0], data.y[first]);
    }

    #[test]
    fn split_is_reproducible() {
        let data = toy(50);
        let a = split(&data, 0.7, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = split(&data, 0.7, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.holdout_indices, b.holdout_indices);
    }

    #[test]
    fn invalid_ratio() {
        let data = toy(10);
        let mut rng = StdRng::seed_from_u64(0);
        for ratio in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            match split(&data, ratio, &mut rng) {
                Err(PipelineError::InvalidRatio(_)) => {}
                other => panic!("expected InvalidRatio for {}, got {:?}", ratio, other),
            }
        }
    }
}
