//! Feature standardisation with an explicit fit/transform split.
//!
//! `fit_scaler` learns a `ScalingProfile` from training rows only; the
//! profile is an immutable value, and `transform_all` is a pure function of
//! (profile, data). Train and holdout must be transformed with the same
//! profile.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Component, PipelineError, Result};

/// Per-feature population mean and standard deviation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalingProfile {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ScalingProfile {
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// Fit a `ScalingProfile` from an `Array2<f64>` where rows are samples and
/// columns are features.
///
/// A constant column (or one whose std is within rounding of zero) is an
/// error unless `epsilon_floor` is given, in which case every std is clamped
/// to at least that value. The floor itself must be finite and positive.
pub fn fit_scaler(
    x: &Array2<f64>,
    feature_names: &[String],
    epsilon_floor: Option<f64>,
) -> Result<ScalingProfile> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 || ncols == 0 {
        return Err(PipelineError::invalid_dataset(
            Component::Scaler,
            "cannot fit a scaler on an empty matrix",
        ));
    }
    if feature_names.len() != ncols {
        return Err(PipelineError::invalid_dataset(
            Component::Scaler,
            format!("{} columns but {} feature names", ncols, feature_names.len()),
        ));
    }

    if let Some(floor) = epsilon_floor {
        if !(floor.is_finite() && floor > 0.0) {
            return Err(PipelineError::invalid_dataset(
                Component::Scaler,
                format!("epsilon floor {} must be finite and positive", floor),
            ));
        }
    }

    let nrows_f = nrows as f64;
    let mut mean = vec![0.0f64; ncols];
    let mut min = vec![f64::INFINITY; ncols];
    let mut max = vec![f64::NEG_INFINITY; ncols];
    for row in x.rows() {
        for (c, &v) in row.iter().enumerate() {
            mean[c] += v;
            min[c] = min[c].min(v);
            max[c] = max[c].max(v);
        }
    }
    for v in mean.iter_mut() {
        *v /= nrows_f;
    }

    let mut std = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, v) in row.iter().enumerate() {
            let d = v - mean[c];
            std[c] += d * d;
        }
    }
    for (c, v) in std.iter_mut().enumerate() {
        *v = (*v / nrows_f).sqrt();
        // Summation error leaves a residual std of order EPSILON * |mean|
        // on constant columns.
        let degenerate = min[c] == max[c] || *v <= f64::EPSILON * mean[c].abs().max(1.0);
        if min[c] == max[c] {
            mean[c] = min[c];
        }
        match epsilon_floor {
            Some(floor) if degenerate => *v = floor,
            Some(floor) => *v = v.max(floor),
            None if degenerate => {
                return Err(PipelineError::DegenerateFeature {
                    feature: feature_names[c].clone(),
                })
            }
            None => {}
        }
    }

    Ok(ScalingProfile {
        feature_names: feature_names.to_vec(),
        mean,
        std,
    })
}

/// Standardise every row with `profile`, returning a new matrix with the
/// same shape and row order.
pub fn transform_all(x: &Array2<f64>, profile: &ScalingProfile) -> Result<Array2<f64>> {
    if x.ncols() != profile.n_features() {
        return Err(PipelineError::invalid_dataset(
            Component::Scaler,
            format!(
                "profile has {} features but matrix has {} columns",
                profile.n_features(),
                x.ncols()
            ),
        ));
    }

    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (*v - profile.mean[c]) / profile.std[c];
        }
    }
    Ok(out)
}

/// Fit a profile on `x` and return it with the transformed matrix.
pub fn fit_transform(
    x: &Array2<f64>,
    feature_names: &[String],
    epsilon_floor: Option<f64>,
) -> Result<(ScalingProfile, Array2<f64>)> {
    let profile = fit_scaler(x, feature_names, epsilon_floor)?;
    let scaled = transform_all(x, &profile)?;
    Ok((profile, scaled))
}
