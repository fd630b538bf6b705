//! Layer normalization module

use crate::autograd::{layer_norm, Context};
use crate::error::Result;
use crate::nn::Module;
use crate::Tensor;
use std::collections::HashMap;

use super::weights::take_param;

/// LayerNorm over the last dimension with learned scale and shift
#[derive(Debug, Clone)]
pub struct LayerNorm {
    /// Scale (gamma)
    pub weight: Tensor,
    /// Shift (beta)
    pub bias: Tensor,
    dim: usize,
    eps: f32,
}

impl LayerNorm {
    /// Unit scale, zero shift
    pub fn new(dim: usize, eps: f32) -> Self {
        Self {
            weight: Tensor::from_vec(vec![1.0; dim], true),
            bias: Tensor::zeros(&[dim], true),
            dim,
            eps,
        }
    }

    /// Take `{prefix}.weight` and `{prefix}.bias` out of a loaded parameter map
    pub fn from_params(
        params: &mut HashMap<String, Tensor>,
        prefix: &str,
        dim: usize,
        eps: f32,
    ) -> Result<Self> {
        Ok(Self {
            weight: take_param(params, &format!("{prefix}.weight"), &[dim])?,
            bias: take_param(params, &format!("{prefix}.bias"), &[dim])?,
            dim,
            eps,
        })
    }

    /// Normalize every row of `x` (last dimension `dim`)
    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        let rows = x.len() / self.dim;
        layer_norm(
            x,
            &ctx.param(&self.weight),
            &ctx.param(&self.bias),
            rows,
            self.dim,
            self.eps,
        )
    }
}

impl Module for LayerNorm {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_keeps_shape() {
        let norm = LayerNorm::new(4, 1e-5);
        let ctx = Context::default();
        let x = Tensor::from_shape_vec(&[2, 4], vec![1.0, 2.0, 3.0, 4.0, 2.0, 2.0, 2.0, 2.0], false);
        let y = norm.forward(&x, &ctx);
        assert_eq!(y.shape(), &[2, 4]);
        // Constant row normalizes to zero
        assert!(y.data().iter().skip(4).all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(LayerNorm::new(8, 1e-5).num_parameters(), 16);
    }
}
