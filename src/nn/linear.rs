//! Dense affine projection in the GPT-2 `Conv1D` layout

use super::{normal_init, Module};
use crate::autograd::{add_broadcast, matmul, Context};
use crate::error::{Error, Result};
use crate::Tensor;

/// `y = x · W + b` with `W` stored `[in_features, out_features]`
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Gaussian weight (`N(0, init_std²)`), zero bias, both trainable
    pub fn new(in_features: usize, out_features: usize, init_std: f32, seed: u64) -> Self {
        let weight = Tensor::from_shape_vec(
            &[in_features, out_features],
            normal_init(in_features * out_features, init_std, seed),
            true,
        );
        let bias = Tensor::zeros(&[out_features], true);
        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Wrap existing weight `[in, out]` and bias `[out]`
    pub fn from_parts(weight: Tensor, bias: Tensor) -> Result<Self> {
        let &[in_features, out_features] = weight.shape() else {
            return Err(Error::ShapeMismatch {
                context: "linear weight".into(),
                expected: vec![0, 0],
                actual: weight.shape().to_vec(),
            });
        };
        if bias.len() != out_features {
            return Err(Error::ShapeMismatch {
                context: "linear bias".into(),
                expected: vec![out_features],
                actual: bias.shape().to_vec(),
            });
        }
        Ok(Self {
            weight,
            bias: bias.reshape(&[out_features]),
            in_features,
            out_features,
        })
    }

    /// Apply to `x` whose last dimension is `in_features`
    ///
    /// Leading dimensions are flattened for the product and restored on output.
    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        affine(
            x,
            &ctx.param(&self.weight),
            &ctx.param(&self.bias),
            self.in_features,
            self.out_features,
        )
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Freeze or unfreeze weight and bias together
    pub fn set_trainable(&mut self, trainable: bool) {
        self.weight.set_requires_grad(trainable);
        self.bias.set_requires_grad(trainable);
    }
}

impl Module for Linear {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

/// `x · W + b` over the rows of `x`, keeping its leading shape
pub(crate) fn affine(
    x: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    in_features: usize,
    out_features: usize,
) -> Tensor {
    let shape = x.shape();
    assert_eq!(
        shape.last().copied(),
        Some(in_features),
        "input last dimension must equal in_features"
    );
    let rows = x.len() / in_features;
    let h = matmul(x, weight, rows, in_features, out_features);
    let y = add_broadcast(&h, bias, rows, out_features);

    let mut out_shape = shape.to_vec();
    if let Some(last) = out_shape.last_mut() {
        *last = out_features;
    }
    y.reshape(&out_shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    fn fixed_linear() -> Linear {
        // W = [[1, 2, 3], [4, 5, 6]], b = [0.5, 0, -0.5]
        Linear::from_parts(
            Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true),
            Tensor::from_vec(vec![0.5, 0.0, -0.5], true),
        )
        .unwrap()
    }

    #[test]
    fn test_forward_matches_affine_map() {
        let layer = fixed_linear();
        let ctx = Context::default();
        let x = Tensor::from_shape_vec(&[1, 2], vec![1.0, -1.0], false);
        let y = layer.forward(&x, &ctx);
        assert_eq!(y.shape(), &[1, 3]);
        assert_abs_diff_eq!(y.data()[0], -2.5);
        assert_abs_diff_eq!(y.data()[1], -3.0);
        assert_abs_diff_eq!(y.data()[2], -3.5);
    }

    #[test]
    fn test_leading_dims_preserved() {
        let layer = Linear::new(4, 6, 0.02, 1);
        let ctx = Context::default();
        let x = Tensor::zeros(&[2, 3, 4], false);
        let y = layer.forward(&x, &ctx);
        assert_eq!(y.shape(), &[2, 3, 6]);
    }

    #[test]
    fn test_from_parts_rejects_bad_bias() {
        let w = Tensor::zeros(&[2, 3], true);
        let b = Tensor::zeros(&[2], true);
        assert!(matches!(
            Linear::from_parts(w, b),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_parts_rejects_flat_weight() {
        let w = Tensor::zeros(&[6], true);
        let b = Tensor::zeros(&[3], true);
        assert!(Linear::from_parts(w, b).is_err());
    }

    #[test]
    fn test_gradients_reach_weight_and_bias() {
        let layer = fixed_linear();
        let ctx = Context::default();
        let x = Tensor::from_shape_vec(&[2, 2], vec![1.0, 0.0, 0.0, 1.0], false);
        let mut y = layer.forward(&x, &ctx);
        backward(&mut y, None);
        assert_eq!(layer.weight().grad().unwrap().to_vec(), vec![1.0; 6]);
        assert_eq!(layer.bias().grad().unwrap().to_vec(), vec![2.0; 3]);
    }

    #[test]
    fn test_parameter_counts() {
        let mut layer = Linear::new(4, 4, 0.02, 0);
        assert_eq!(layer.num_parameters(), 20);
        assert_eq!(layer.num_trainable_parameters(), 20);
        layer.set_trainable(false);
        assert_eq!(layer.num_trainable_parameters(), 0);
    }
}
