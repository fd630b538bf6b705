//! Test utilities for gradient checking

use crate::autograd::{backward, Tensor};
use ndarray::Array1;

/// Finite difference gradient checker
///
/// Computes numerical gradient using central difference:
/// f'(x) ≈ (f(x + h) - f(x - h)) / (2h)
pub fn finite_difference<F>(f: F, x: &[f32], epsilon: f32) -> Vec<f32>
where
    F: Fn(&[f32]) -> f32,
{
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for i in 0..x.len() {
        x_plus[i] = x[i] + epsilon;
        x_minus[i] = x[i] - epsilon;

        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * epsilon);

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    grad
}

/// Fixed, non-uniform output weights so that the checked loss `Σ wᵢ·yᵢ`
/// does not collapse to a constant (e.g. the plain sum of a layer norm)
pub fn probe_weights(n: usize) -> Array1<f32> {
    (0..n).map(|i| ((i * 7 % 11) as f32 - 5.0) * 0.2 + 0.05).collect()
}

/// Compare the autograd gradient of `Σ wᵢ·f(x)ᵢ` against central differences
pub fn assert_gradient_matches<F>(f: F, x: &[f32], tolerance: f32)
where
    F: Fn(&Tensor) -> Tensor,
{
    let input = Tensor::from_vec(x.to_vec(), true);
    let mut out = f(&input);
    let weights = probe_weights(out.len());
    backward(&mut out, Some(weights.clone()));
    let analytical = input.grad().expect("gradient should be available");

    let numerical = finite_difference(
        |xv| {
            let t = Tensor::from_vec(xv.to_vec(), false);
            f(&t).data().dot(&weights)
        },
        x,
        1e-2,
    );

    for i in 0..x.len() {
        let diff = (analytical[i] - numerical[i]).abs();
        let bound = tolerance * (1.0 + numerical[i].abs());
        assert!(
            diff < bound,
            "gradient mismatch at {i}: analytical={}, numerical={}, diff={diff}",
            analytical[i],
            numerical[i]
        );
    }
}

/// Deterministic pseudo-random values in `[-scale, scale)`
pub fn sample_values(n: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * scale
        })
        .collect()
}
