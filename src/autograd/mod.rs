//! Tape-based autograd engine
//!
//! Provides automatic differentiation using a computational graph with gradient tape.
//! Every op records a [`BackwardOp`] on its output; [`backward`] walks the
//! recorded graph from a scalar loss in reverse topological order.

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use context::Context;
pub use ops::*;
pub use tensor::Tensor;

/// Perform backward pass on a tensor
///
/// Seeds the output gradient (ones when `grad_output` is `None`) and runs every
/// recorded op once, after all ops that consume its output.
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| ndarray::Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    for op in backward::topological_order(tensor) {
        op.backward();
    }
}
