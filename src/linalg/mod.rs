//! Dense linear algebra kernels

mod svd;

pub use svd::{svd, Svd, MAX_QL_ITERATIONS};
