#![allow(dead_code)]

use disruption_classifiers::data_handling::{Dataset, FEATURE_NAMES};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Approximately standard normal draw (Irwin-Hall with 12 uniforms).
fn normal(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

/// Synthetic shots over the canonical schema.
///
/// Each row is a disruption with probability `positive_rate`. Disruptions
/// shift plasma current, radiated power and turbulence upwards; the other
/// measurements are pure noise.
pub fn synthetic_dataset(n: usize, positive_rate: f64, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, FEATURE_NAMES.len()));
    let mut y = Array1::zeros(n);
    let scales = [1.5, 5.0, 2.5, 1.0e3, 10.0, 3.5, 0.1, 50.0, 0.5];

    for r in 0..n {
        let label = u8::from(rng.gen::<f64>() < positive_rate);
        y[r] = label;
        for (c, scale) in scales.iter().enumerate() {
            let shift = match (label, c) {
                (1, 0) => 1.5,
                (1, 4) => 2.0,
                (1, 8) => 1.0,
                _ => 0.0,
            };
            x[(r, c)] = scale * (2.0 + normal(&mut rng) * 0.5 + shift * 0.5);
        }
    }
    Dataset::with_canonical_schema(x, y).expect("synthetic dataset is valid")
}
