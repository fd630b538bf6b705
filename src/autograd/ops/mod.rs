//! Autograd operations with backward passes
//!
//! This module provides differentiable operations for automatic differentiation.

mod activations;
mod attention;
mod basic;
mod embedding;
mod matmul;
mod normalize;

// Re-export all public operations
pub use activations::gelu;
pub use attention::causal_self_attention;
pub use basic::{add, add_broadcast, dropout, scale, sum};
pub use embedding::embedding;
pub use matmul::{matmul, matmul_compute, matrix_transpose, transpose};
pub use normalize::layer_norm;
