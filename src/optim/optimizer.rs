//! Optimizer trait

use crate::Tensor;

/// Trait for optimization algorithms
///
/// Per-parameter state (moments, velocities) is keyed by position, so callers
/// must pass parameters in the same order on every step.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]) {
        let mut refs: Vec<&mut Tensor> = params.iter_mut().collect();
        self.step_refs(&mut refs);
    }

    /// Perform optimization step on referenced parameters
    ///
    /// This is the entry point used with parameters borrowed from a model.
    /// Parameters without a gradient are left untouched.
    fn step_refs(&mut self, params: &mut [&mut Tensor]);

    /// Zero gradients on referenced parameters
    fn zero_grad_refs(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter() {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
