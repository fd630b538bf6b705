//! Neural network building blocks
//!
//! [`Module`] is the parameter-walking interface shared by every layer; the
//! patcher and the optimizer only see models through it.

mod init;
mod linear;

pub use init::normal_init;
pub(crate) use linear::affine;
pub use linear::Linear;

use crate::Tensor;

/// A layer or model that owns parameters
pub trait Module {
    /// All parameters, frozen ones included
    fn parameters(&self) -> Vec<&Tensor>;

    /// Mutable handles to all parameters
    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    /// Parameters that receive gradients and optimizer updates
    fn trainable_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.parameters_mut()
            .into_iter()
            .filter(|p| p.requires_grad())
            .collect()
    }

    /// Total scalar parameter count
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    /// Scalar count over parameters flagged trainable
    fn num_trainable_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad())
            .map(|p| p.len())
            .sum()
    }

    /// Clear gradients on every parameter
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }
}
