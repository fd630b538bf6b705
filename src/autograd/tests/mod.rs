//! Tests for autograd operations with gradient checking

mod prop_ops;
mod test_utils;
