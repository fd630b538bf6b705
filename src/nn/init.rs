//! Parameter initialization

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// `len` samples from `N(0, std²)`, reproducible for a given seed
pub fn normal_init(len: usize, std: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    match Normal::new(0.0f32, std) {
        Ok(dist) => (0..len).map(|_| dist.sample(&mut rng)).collect(),
        // Non-finite or negative std degenerates to a constant
        Err(_) => vec![0.0; len],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_reproducible() {
        assert_eq!(normal_init(16, 0.02, 7), normal_init(16, 0.02, 7));
        assert_ne!(normal_init(16, 0.02, 7), normal_init(16, 0.02, 8));
    }

    #[test]
    fn test_sample_statistics() {
        let values = normal_init(20_000, 2.0, 1);
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
    }

    #[test]
    fn test_zero_std_is_zeros() {
        assert!(normal_init(4, 0.0, 3).iter().all(|&v| v == 0.0));
    }
}
