//! Exhaustive stratified k-fold grid search.
//!
//! Every (setting, fold) pair is an independent task: fit a fresh model on
//! the other folds and score the held-out fold. Tasks run on rayon and are
//! collected in canonical order before the single-threaded reduction, so the
//! outcome does not depend on scheduling.
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::{ModelType, ParameterGrid, ParameterSetting};
use crate::error::{Component, PipelineError, Result};
use crate::models::factory::build_model;
use crate::stats::RankingMetric;

/// Cross-validation knobs of one search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub k_folds: usize,
    pub metric: RankingMetric,
    pub model: ModelType,
    /// Size of a dedicated worker pool; `None` runs on the global pool.
    pub n_threads: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub setting: ParameterSetting,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Population variance of the fold scores.
    pub score_variance: f64,
    /// 1 for the best mean score.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub metric: RankingMetric,
    pub k_folds: usize,
    /// One entry per grid point, in canonical order.
    pub trials: Vec<TrialResult>,
    pub best: ParameterSetting,
    pub best_index: usize,
    pub best_score: f64,
    pub fits_performed: usize,
}

/// Held-out row indices of each fold, class proportions preserved.
///
/// Each class's indices are shuffled and dealt round-robin over the folds.
pub fn stratified_folds<R: Rng + ?Sized>(
    y: &Array1<u8>,
    k_folds: usize,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        by_class[usize::from(label == 1)].push(i);
    }
    let smallest_class = by_class[0].len().min(by_class[1].len());
    if k_folds < 2 || smallest_class < k_folds {
        return Err(PipelineError::InvalidFoldCount {
            k_folds,
            smallest_class,
        });
    }

    let mut folds = vec![Vec::new(); k_folds];
    for class in by_class.iter_mut() {
        class.shuffle(rng);
        for (pos, &idx) in class.iter().enumerate() {
            folds[pos % k_folds].push(idx);
        }
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    Ok(folds)
}

struct FoldData {
    train_x: Array2<f64>,
    train_y: Vec<u8>,
    test_x: Array2<f64>,
    test_y: Vec<u8>,
}

fn materialize_folds(x: &Array2<f64>, y: &Array1<u8>, folds: &[Vec<usize>]) -> Result<Vec<FoldData>> {
    let n = y.len();
    folds
        .iter()
        .enumerate()
        .map(|(f, test_idx)| {
            let mut in_test = vec![false; n];
            for &i in test_idx {
                in_test[i] = true;
            }
            let train_idx: Vec<usize> = (0..n).filter(|&i| !in_test[i]).collect();

            let data = FoldData {
                train_x: x.select(Axis(0), &train_idx),
                train_y: train_idx.iter().map(|&i| y[i]).collect(),
                test_x: x.select(Axis(0), test_idx),
                test_y: test_idx.iter().map(|&i| y[i]).collect(),
            };
            let has_both = |labels: &[u8]| labels.contains(&0) && labels.contains(&1);
            if !has_both(&data.train_y) || !has_both(&data.test_y) {
                return Err(PipelineError::DegenerateFold { fold: f });
            }
            Ok(data)
        })
        .collect()
}

fn run_trial(
    setting: ParameterSetting,
    fold: usize,
    data: &FoldData,
    options: &SearchOptions,
    seed: u64,
) -> Result<f64> {
    let mut model = build_model(&options.model, setting, seed);
    model.fit(&data.train_x, &data.train_y)?;
    let proba = model.predict_proba(&data.test_x)?;
    let score = options
        .metric
        .score(&proba, &data.test_y)
        .ok_or(PipelineError::DegenerateFold { fold })?;
    log::trace!("{:?} fold {}: {} = {:.5}", setting, fold, options.metric.name(), score);
    Ok(score)
}

/// Score every setting of `grid` with stratified k-fold cross-validation and
/// select the best mean score; ties keep the earliest setting.
pub fn search<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &Array1<u8>,
    grid: &ParameterGrid,
    options: &SearchOptions,
    rng: &mut R,
) -> Result<SearchOutcome> {
    if grid.is_empty() {
        return Err(PipelineError::EmptyGrid);
    }
    let settings = grid.settings();
    for setting in &settings {
        setting.validate(Component::HyperparameterSearchEngine)?;
    }
    options.model.validate(Component::HyperparameterSearchEngine)?;
    if x.nrows() != y.len() {
        return Err(PipelineError::invalid_dataset(
            Component::HyperparameterSearchEngine,
            format!("{} feature rows but {} labels", x.nrows(), y.len()),
        ));
    }

    let folds = stratified_folds(y, options.k_folds, rng)?;
    let fold_data = materialize_folds(x, y, &folds)?;
    let model_seed: u64 = rng.gen();

    let tasks: Vec<(usize, usize)> = (0..settings.len())
        .flat_map(|s| (0..options.k_folds).map(move |f| (s, f)))
        .collect();

    log::debug!(
        "Grid search: {} settings x {} folds = {} fits ({})",
        settings.len(),
        options.k_folds,
        tasks.len(),
        options.model.name()
    );

    let run_all = || -> Result<Vec<f64>> {
        tasks
            .par_iter()
            .map(|&(s, f)| {
                run_trial(
                    settings[s],
                    f,
                    &fold_data[f],
                    options,
                    model_seed.wrapping_add(f as u64),
                )
            })
            .collect()
    };

    let scores = match options.n_threads {
        Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(run_all)?,
            Err(e) => {
                log::warn!("Could not build a {}-thread pool ({}); using the global pool", n, e);
                run_all()?
            }
        },
        None => run_all()?,
    };
    let fits_performed = scores.len();

    let mut trials: Vec<TrialResult> = settings
        .iter()
        .zip(scores.chunks(options.k_folds))
        .map(|(&setting, fold_scores)| {
            let mean_score = fold_scores.iter().mean();
            let score_variance = fold_scores.iter().population_variance();
            log::debug!(
                "{:?}: mean {} {:.5} (var {:.2e})",
                setting,
                options.metric.name(),
                mean_score,
                score_variance
            );
            TrialResult {
                setting,
                fold_scores: fold_scores.to_vec(),
                mean_score,
                score_variance,
                rank: 0,
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..trials.len()).collect();
    order.sort_by(|&a, &b| trials[b].mean_score.total_cmp(&trials[a].mean_score));
    for (rank, &idx) in order.iter().enumerate() {
        trials[idx].rank = rank + 1;
    }

    let mut best_index = 0;
    for (i, trial) in trials.iter().enumerate() {
        if trial.mean_score > trials[best_index].mean_score {
            best_index = i;
        }
    }
    let best = trials[best_index].setting;
    let best_score = trials[best_index].mean_score;

    Ok(SearchOutcome {
        metric: options.metric,
        k_folds: options.k_folds,
        trials,
        best,
        best_index,
        best_score,
        fits_performed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn data(n: usize, seed: u64) -> (Array2<f64>, Array1<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let y = Array1::from_shape_fn(n, |r| u8::from(r % 2 == 0));
        let x = Array2::from_shape_fn((n, 2), |(r, c)| {
            let shift = if c == 0 && y[r] == 1 { 1.0 } else { 0.0 };
            rng.gen::<f64>() + shift
        });
        (x, y)
    }

    fn options(k_folds: usize) -> SearchOptions {
        SearchOptions {
            k_folds,
            metric: RankingMetric::RocAuc,
            model: ModelType::default(),
            n_threads: None,
        }
    }

    fn small_setting() -> ParameterSetting {
        ParameterSetting {
            learning_rate: 0.1,
            max_depth: 2,
            n_estimators: 10,
            subsample: 1.0,
        }
    }

    #[test]
    fn folds_are_stratified_and_disjoint() {
        let y = Array1::from_shape_fn(30, |r| u8::from(r < 9));
        let folds = stratified_folds(&y, 3, &mut StdRng::seed_from_u64(0)).unwrap();
        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
        for fold in &folds {
            let pos = fold.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(pos, 3);
            assert_eq!(fold.len(), 10);
        }
    }

    #[test]
    fn fold_count_must_fit_smallest_class() {
        let y = Array1::from_shape_fn(10, |r| u8::from(r < 2));
        match stratified_folds(&y, 3, &mut StdRng::seed_from_u64(0)) {
            Err(PipelineError::InvalidFoldCount {
                k_folds,
                smallest_class,
            }) => {
                assert_eq!(k_folds, 3);
                assert_eq!(smallest_class, 2);
            }
            other => panic!("expected InvalidFoldCount, got {:?}", other),
        }
        assert!(stratified_folds(&y, 1, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn single_setting_runs_one_fit_per_fold() {
        let (x, y) = data(60, 1);
        let grid = ParameterGrid::single(small_setting());
        let outcome = search(&x, &y, &grid, &options(3), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(outcome.fits_performed, 3);
        assert_eq!(outcome.trials.len(), 1);
        assert_eq!(outcome.trials[0].fold_scores.len(), 3);
        assert_eq!(outcome.best, small_setting());
        assert_eq!(outcome.trials[0].rank, 1);
    }

    #[test]
    fn empty_grid_is_rejected() {
        let (x, y) = data(20, 1);
        let grid = ParameterGrid {
            max_depth: vec![],
            ..ParameterGrid::default()
        };
        assert_eq!(
            search(&x, &y, &grid, &options(3), &mut StdRng::seed_from_u64(0)).unwrap_err(),
            PipelineError::EmptyGrid
        );
    }

    #[test]
    fn ties_keep_the_first_setting() {
        // Zero stages: every setting predicts the prior, AUC 0.5 everywhere
        let (x, y) = data(30, 2);
        let grid = ParameterGrid {
            n_estimators: vec![0],
            learning_rate: vec![0.3, 0.1],
            max_depth: vec![2],
            subsample: vec![1.0],
        };
        let outcome = search(&x, &y, &grid, &options(3), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(outcome.best_index, 0);
        assert_eq!(outcome.best.learning_rate, 0.3);
        assert_eq!(outcome.trials[0].rank, 1);
        assert_eq!(outcome.trials[1].rank, 2);
        assert_eq!(outcome.trials[0].score_variance, 0.0);
    }

    #[test]
    fn same_seed_same_outcome() {
        let (x, y) = data(60, 3);
        let grid = ParameterGrid {
            n_estimators: vec![5, 15],
            learning_rate: vec![0.1],
            max_depth: vec![1, 3],
            subsample: vec![0.8],
        };
        let a = search(&x, &y, &grid, &options(3), &mut StdRng::seed_from_u64(9)).unwrap();
        let mut threaded = options(3);
        threaded.n_threads = Some(2);
        let b = search(&x, &y, &grid, &threaded, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fits_performed, 12);
    }

    #[test]
    fn invalid_grid_entry_stops_the_search() {
        let (x, y) = data(30, 4);
        let grid = ParameterGrid {
            subsample: vec![1.0, 0.0],
            ..ParameterGrid::single(small_setting())
        };
        match search(&x, &y, &grid, &options(3), &mut StdRng::seed_from_u64(0)) {
            Err(PipelineError::InvalidParameter {
                component,
                parameter,
                ..
            }) => {
                assert_eq!(component, Component::HyperparameterSearchEngine);
                assert_eq!(parameter, "subsample");
            }
            other => panic!("expected InvalidParameter, got {:?}", other.map(|o| o.best)),
        }
    }
}
