//! Execution context for forward passes
//!
//! Carries the compute device, train/eval mode, gradient recording and the
//! random state used by dropout.

use super::{dropout, Tensor};
use crate::device::ComputeDevice;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;

const DEFAULT_SEED: u64 = 42;

/// Context for managing the computational graph
pub struct Context {
    device: ComputeDevice,
    training: bool,
    grad_enabled: bool,
    rng: RefCell<StdRng>,
}

impl Context {
    /// Create a training-mode context on `device`
    pub fn new(device: ComputeDevice) -> Self {
        Self::with_seed(device, DEFAULT_SEED)
    }

    /// Create a context with a seeded dropout generator
    pub fn with_seed(device: ComputeDevice, seed: u64) -> Self {
        Self {
            device,
            training: true,
            grad_enabled: true,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    pub fn grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    /// Handle to a parameter for use in a forward pass
    ///
    /// With recording disabled the parameter is detached, so no graph is built.
    pub fn param(&self, tensor: &Tensor) -> Tensor {
        if self.grad_enabled {
            tensor.clone()
        } else {
            tensor.detach()
        }
    }

    /// Inverted dropout, identity outside training mode
    pub fn dropout(&self, x: &Tensor, p: f32) -> Tensor {
        if !self.training || p <= 0.0 {
            return x.clone();
        }
        dropout(x, p, &mut *self.rng.borrow_mut())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ComputeDevice::Cpu)
    }
}
