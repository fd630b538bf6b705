//! Property-based gradient checks

use super::test_utils::{assert_gradient_matches, sample_values};
use crate::autograd::{causal_self_attention, layer_norm, matmul, Tensor};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_matmul_gradient_check(
        m in 1usize..5,
        k in 1usize..5,
        n in 1usize..5,
        seed in 0u64..1000,
    ) {
        let a = sample_values(m * k, seed, 1.0);
        let b = Tensor::from_vec(sample_values(k * n, seed + 1, 1.0), false);
        assert_gradient_matches(|t| matmul(t, &b, m, k, n), &a, 2e-2);
    }

    #[test]
    fn prop_layer_norm_gradient_check(
        rows in 1usize..4,
        cols in 4usize..8,
        seed in 0u64..1000,
    ) {
        let x = sample_values(rows * cols, seed, 3.0);
        let g = Tensor::from_vec(vec![1.0; cols], false);
        let b = Tensor::from_vec(vec![0.0; cols], false);
        assert_gradient_matches(|t| layer_norm(t, &g, &b, rows, cols, 1e-5), &x, 5e-2);
    }

    #[test]
    fn prop_attention_rows_are_convex_combinations(
        seq in 1usize..5,
        seed in 0u64..1000,
    ) {
        // With every value vector equal, attention returns that vector
        let (heads, head_dim) = (2, 2);
        let embd = heads * head_dim;
        let value: [f32; 4] = [0.5, -1.0, 2.0, 0.25];
        let mut qkv = sample_values(seq * 3 * embd, seed, 2.0);
        for row in qkv.chunks_exact_mut(3 * embd) {
            row[2 * embd..].copy_from_slice(&value);
        }
        let out = causal_self_attention(&Tensor::from_vec(qkv, false), 1, seq, heads, head_dim);
        for row in out.data().as_slice().unwrap().chunks_exact(embd) {
            for (got, want) in row.iter().zip(value.iter()) {
                prop_assert!((got - want).abs() < 1e-5);
            }
        }
    }
}
