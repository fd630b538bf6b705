//! Truncated-SVD factorized projection

use crate::autograd::{matmul, matmul_compute, matrix_transpose, transpose, Context};
use crate::error::{Error, Result};
use crate::linalg::svd;
use crate::nn::{affine, Linear, Module};
use crate::Tensor;
use ndarray::Array2;

/// Projection `y = x · (U·S) · Vᵀ + b` built from a dense layer's weight
///
/// `U·S` (`[in, r]`) is frozen; `V` (`[out, r]`) and the bias (`[out]`) train,
/// giving `out·r + out` trainable scalars.
#[derive(Debug, Clone)]
pub struct SvdLinear {
    su: Tensor,
    v: Tensor,
    bias: Tensor,
    in_features: usize,
    out_features: usize,
    rank: usize,
}

impl SvdLinear {
    /// Factorize `layer`'s weight, keeping at most `rank` singular triplets
    ///
    /// `None` keeps all `min(in, out)` of them. A rank at or above that count
    /// is not truncated.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for rank 0, [`Error::Decomposition`] when the
    /// SVD fails.
    pub fn from_linear(layer: &Linear, rank: Option<usize>) -> Result<Self> {
        if rank == Some(0) {
            return Err(Error::InvalidArgument("rank must be at least 1".into()));
        }
        let (in_features, out_features) = (layer.in_features(), layer.out_features());

        let weight = Array2::from_shape_fn((in_features, out_features), |(i, j)| {
            f64::from(layer.weight().data()[i * out_features + j])
        });
        let mut factors = svd(weight.view())?;
        if let Some(r) = rank {
            factors = factors.truncate(r);
        }
        let r = factors.rank();

        let su: Vec<f32> = factors.scaled_u().iter().map(|&v| v as f32).collect();
        let v: Vec<f32> = factors.v.iter().map(|&v| v as f32).collect();

        Ok(Self {
            su: Tensor::from_shape_vec(&[in_features, r], su, false),
            v: Tensor::from_shape_vec(&[out_features, r], v, true),
            bias: layer.bias().detach().reshape(&[out_features]).with_requires_grad(true),
            in_features,
            out_features,
            rank: r,
        })
    }

    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        let shape = x.shape();
        assert_eq!(
            shape.last().copied(),
            Some(self.in_features),
            "input last dimension must equal in_features"
        );
        let rows = x.len() / self.in_features;

        let h = matmul(x, &ctx.param(&self.su), rows, self.in_features, self.rank);
        let mut h_shape = shape.to_vec();
        if let Some(last) = h_shape.last_mut() {
            *last = self.rank;
        }
        let v_t = matrix_transpose(&ctx.param(&self.v), self.out_features, self.rank);
        affine(
            &h.reshape(&h_shape),
            &v_t,
            &ctx.param(&self.bias),
            self.rank,
            self.out_features,
        )
    }

    /// Dense layer with weight `(U·S)·Vᵀ` and the current bias
    pub fn to_linear(&self) -> Result<Linear> {
        let su = self.su.data().as_slice().expect("factor must be contiguous");
        let v_t = transpose(
            self.v.data().as_slice().expect("factor must be contiguous"),
            self.out_features,
            self.rank,
        );
        let weight = matmul_compute(su, &v_t, self.in_features, self.rank, self.out_features);
        Linear::from_parts(
            Tensor::from_shape_vec(&[self.in_features, self.out_features], weight, true),
            self.bias.detach().with_requires_grad(true),
        )
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Frozen left factor `U·S`, `[in, r]`
    pub fn su(&self) -> &Tensor {
        &self.su
    }

    /// Trainable right factor `V`, `[out, r]`
    pub fn v(&self) -> &Tensor {
        &self.v
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Module for SvdLinear {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.su, &self.v, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.su, &mut self.v, &mut self.bias]
    }
}
