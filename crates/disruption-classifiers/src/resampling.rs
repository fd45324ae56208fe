//! SMOTE minority oversampling.
//!
//! Synthetic minority rows are interpolated between a minority sample and one
//! of its `k` nearest minority neighbours until both classes have the same
//! count. Only ever applied to the (scaled) training split.
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data_handling::ClassBalance;
use crate::error::{Component, PipelineError, Result};

/// Class counts before and after oversampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResamplingSummary {
    pub k_neighbors: usize,
    pub minority_label: u8,
    pub before: ClassBalance,
    pub after: ClassBalance,
    pub synthetic_samples: usize,
}

#[derive(Debug, Clone)]
pub struct Resampled {
    pub x: Array2<f64>,
    pub y: Array1<u8>,
    pub summary: ResamplingSummary,
}

fn balance(y: &Array1<u8>) -> ClassBalance {
    let positives = y.iter().filter(|&&l| l == 1).count();
    ClassBalance {
        samples: y.len(),
        positives,
        negatives: y.len() - positives,
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum()
}

/// For each minority row, the positions (into `minority`) of its `k` nearest
/// other minority rows. Distance ties go to the lower position.
fn nearest_neighbors(x: &Array2<f64>, minority: &[usize], k: usize) -> Vec<Vec<usize>> {
    minority
        .par_iter()
        .enumerate()
        .map(|(i, &row)| {
            let mut candidates: Vec<(f64, usize)> = minority
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, &other)| (squared_distance(x.row(row), x.row(other)), j))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            candidates.truncate(k);
            candidates.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

/// Oversample the minority class of `(x, y)` to parity.
///
/// Output rows are the originals in their original order followed by the
/// synthetic rows. Balanced input comes back unchanged.
pub fn resample<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &Array1<u8>,
    k: usize,
    rng: &mut R,
) -> Result<Resampled> {
    if x.nrows() != y.len() {
        return Err(PipelineError::invalid_dataset(
            Component::ImbalanceCorrector,
            format!("{} feature rows but {} labels", x.nrows(), y.len()),
        ));
    }
    if k == 0 {
        return Err(PipelineError::invalid_dataset(
            Component::ImbalanceCorrector,
            "k_neighbors must be at least 1",
        ));
    }

    let before = balance(y);
    let minority_label = if before.positives <= before.negatives { 1 } else { 0 };
    let (n_minority, n_majority) = if minority_label == 1 {
        (before.positives, before.negatives)
    } else {
        (before.negatives, before.positives)
    };

    if n_minority == n_majority {
        log::debug!("Training set already balanced ({} per class)", n_minority);
        return Ok(Resampled {
            x: x.clone(),
            y: y.clone(),
            summary: ResamplingSummary {
                k_neighbors: k,
                minority_label,
                before,
                after: before,
                synthetic_samples: 0,
            },
        });
    }

    if n_minority < k + 1 {
        return Err(PipelineError::InsufficientMinoritySamples {
            found: n_minority,
            required: k + 1,
        });
    }

    let minority: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == minority_label)
        .map(|(i, _)| i)
        .collect();
    let neighbors = nearest_neighbors(x, &minority, k);

    let n_synthetic = n_majority - n_minority;
    let mut synthetic = Array2::<f64>::zeros((n_synthetic, x.ncols()));
    for mut out in synthetic.axis_iter_mut(Axis(0)) {
        let i = rng.gen_range(0..minority.len());
        let j = neighbors[i][rng.gen_range(0..k)];
        let gap: f64 = rng.gen();
        let base = x.row(minority[i]);
        let neighbor = x.row(minority[j]);
        for ((o, &b), &n) in out.iter_mut().zip(base.iter()).zip(neighbor.iter()) {
            *o = b + gap * (n - b);
        }
    }

    let x_res = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()]).map_err(|e| {
        PipelineError::invalid_dataset(Component::ImbalanceCorrector, e.to_string())
    })?;
    let mut labels = y.to_vec();
    labels.extend(std::iter::repeat(minority_label).take(n_synthetic));
    let y_res = Array1::from_vec(labels);

    let after = balance(&y_res);
    log::debug!(
        "SMOTE (k={}): {} minority / {} majority -> {} synthetic samples",
        k,
        n_minority,
        n_majority,
        n_synthetic
    );

    Ok(Resampled {
        x: x_res,
        y: y_res,
        summary: ResamplingSummary {
            k_neighbors: k,
            minority_label,
            before,
            after,
            synthetic_samples: n_synthetic,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn imbalanced(n: usize, every: usize) -> (Array2<f64>, Array1<u8>) {
        let x = Array2::from_shape_fn((n, 3), |(r, c)| ((r * 7 + c * 3) % 11) as f64 + r as f64 * 0.01);
        let y = Array1::from_shape_fn(n, |r| u8::from(r % every == 0));
        (x, y)
    }

    #[test]
    fn classes_are_balanced_exactly() {
        let (x, y) = imbalanced(120, 6);
        let mut rng = StdRng::seed_from_u64(42);
        let out = resample(&x, &y, 5, &mut rng).unwrap();

        assert_eq!(out.summary.after.positives, out.summary.after.negatives);
        assert_eq!(out.summary.synthetic_samples, 100 - 20);
        assert_eq!(out.x.nrows(), out.y.len());
        // Originals are kept first and untouched
        assert_eq!(out.x.slice(ndarray::s![..120, ..]), x);
        assert!(out.y.iter().skip(120).all(|&l| l == 1));
    }

    #[test]
    fn synthetic_rows_lie_within_minority_bounds() {
        let (x, y) = imbalanced(60, 4);
        let out = resample(&x, &y, 3, &mut StdRng::seed_from_u64(1)).unwrap();
        for c in 0..x.ncols() {
            let (lo, hi) = x
                .column(c)
                .iter()
                .zip(y.iter())
                .filter(|(_, &l)| l == 1)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (&v, _)| {
                    (lo.min(v), hi.max(v))
                });
            for r in 60..out.x.nrows() {
                let v = out.x[(r, c)];
                assert!(v >= lo - 1e-12 && v <= hi + 1e-12);
            }
        }
    }

    #[test]
    fn minority_can_be_the_zero_label() {
        let (x, y) = imbalanced(40, 5);
        let flipped = y.mapv(|l| 1 - l);
        let out = resample(&x, &flipped, 2, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(out.summary.minority_label, 0);
        assert_eq!(out.summary.after.negatives, 32);
        assert_eq!(out.summary.after.positives, 32);
    }

    #[test]
    fn too_few_minority_samples() {
        let (x, y) = imbalanced(20, 5);
        match resample(&x, &y, 5, &mut StdRng::seed_from_u64(0)) {
            Err(PipelineError::InsufficientMinoritySamples { found, required }) => {
                assert_eq!(found, 4);
                assert_eq!(required, 6);
            }
            other => panic!("expected InsufficientMinoritySamples, got {:?}", other),
        }
    }

    #[test]
    fn balanced_input_is_unchanged() {
        let (x, _) = imbalanced(10, 2);
        let y = Array1::from_shape_fn(10, |r| (r % 2) as u8);
        let out = resample(&x, &y, 5, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(out.x, x);
        assert_eq!(out.y, y);
        assert_eq!(out.summary.synthetic_samples, 0);
    }

    #[test]
    fn same_seed_same_samples() {
        let (x, y) = imbalanced(90, 7);
        let a = resample(&x, &y, 4, &mut StdRng::seed_from_u64(11)).unwrap();
        let b = resample(&x, &y, 4, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn neighbor_ties_prefer_lower_index() {
        // Rows 1 and 2 are equidistant from row 0
        let x = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, -1.0]).unwrap();
        let neighbors = nearest_neighbors(&x, &[0, 1, 2], 1);
        assert_eq!(neighbors[0], vec![1]);
        assert_eq!(neighbors[1], vec![0]);
        assert_eq!(neighbors[2], vec![0]);
    }
}
