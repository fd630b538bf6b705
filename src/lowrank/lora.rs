//! LoRA (Low-Rank Adaptation) projection
//!
//! For a weight `W ∈ ℝ^(in × out)` in the `Conv1D` layout, LoRA adds
//! `ΔW = scale · A·B` with `A ∈ ℝ^(in × r)` and `B ∈ ℝ^(r × out)`:
//!
//! `y = x · (W + scale · A·B) + b`
//!
//! Both factors start from `N(0, init_std²)`, so the adapted layer does not
//! reproduce the original output at initialization. The wrapped layer stays
//! resident and, unless `freeze_base` is set, keeps training too.

use crate::autograd::{add, matmul, matmul_compute, scale, Context};
use crate::error::{Error, Result};
use crate::nn::{affine, normal_init, Linear, Module};
use crate::Tensor;
use serde::{Deserialize, Serialize};

/// LoRA hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Inner dimension of `A·B`
    pub rank: usize,
    /// Scaling numerator; `scale = alpha / rank`, `None` means `alpha = rank`
    #[serde(default)]
    pub alpha: Option<f32>,
    /// Stop gradients to the wrapped weight and bias
    #[serde(default)]
    pub freeze_base: bool,
    /// Standard deviation of the factor initialization
    #[serde(default = "default_init_std")]
    pub init_std: f32,
    #[serde(default)]
    pub seed: u64,
}

fn default_init_std() -> f32 {
    1.0
}

impl LoraConfig {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            alpha: None,
            freeze_base: false,
            init_std: default_init_std(),
            seed: 0,
        }
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn freeze_base(mut self, freeze: bool) -> Self {
        self.freeze_base = freeze;
        self
    }

    pub fn init_std(mut self, std: f32) -> Self {
        self.init_std = std;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Multiplier applied to `A·B`
    pub fn scale(&self) -> f32 {
        self.alpha.unwrap_or(self.rank as f32) / self.rank as f32
    }
}

/// Dense projection plus a trainable low-rank correction
#[derive(Debug, Clone)]
pub struct LoraLinear {
    base: Linear,
    lora_a: Tensor,
    lora_b: Tensor,
    rank: usize,
    scale: f32,
}

impl LoraLinear {
    /// Wrap `layer` with freshly initialized factors
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for rank 0.
    pub fn from_linear(layer: &Linear, config: &LoraConfig) -> Result<Self> {
        if config.rank == 0 {
            return Err(Error::InvalidArgument("rank must be at least 1".into()));
        }
        let (d_in, d_out, r) = (layer.in_features(), layer.out_features(), config.rank);

        let mut base = layer.clone();
        if config.freeze_base {
            base.set_trainable(false);
        }

        let lora_a = Tensor::from_shape_vec(
            &[d_in, r],
            normal_init(d_in * r, config.init_std, config.seed),
            true,
        );
        let lora_b = Tensor::from_shape_vec(
            &[r, d_out],
            normal_init(r * d_out, config.init_std, config.seed.wrapping_add(1)),
            true,
        );

        Ok(Self {
            base,
            lora_a,
            lora_b,
            rank: r,
            scale: config.scale(),
        })
    }

    /// Forward pass: y = x · (W + scale · A·B) + b
    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        let (d_in, d_out) = (self.base.in_features(), self.base.out_features());

        let delta = matmul(
            &ctx.param(&self.lora_a),
            &ctx.param(&self.lora_b),
            d_in,
            self.rank,
            d_out,
        );
        let delta = if (self.scale - 1.0).abs() > f32::EPSILON {
            scale(&delta, self.scale)
        } else {
            delta
        };
        let weight = add(&ctx.param(self.base.weight()), &delta);

        affine(x, &weight, &ctx.param(self.base.bias()), d_in, d_out)
    }

    /// Fold the correction into a dense layer: W' = W + scale · A·B
    pub fn merge(&self) -> Result<Linear> {
        let (d_in, d_out) = (self.base.in_features(), self.base.out_features());
        let ab = matmul_compute(
            self.lora_a.data().as_slice().expect("factor A must be contiguous"),
            self.lora_b.data().as_slice().expect("factor B must be contiguous"),
            d_in,
            self.rank,
            d_out,
        );
        let merged: Vec<f32> = self
            .base
            .weight()
            .data()
            .iter()
            .zip(&ab)
            .map(|(w, d)| w + self.scale * d)
            .collect();
        Linear::from_parts(
            Tensor::from_shape_vec(&[d_in, d_out], merged, true),
            self.base.bias().detach().with_requires_grad(true),
        )
    }

    /// The wrapped dense layer
    pub fn base(&self) -> &Linear {
        &self.base
    }

    pub fn lora_a(&self) -> &Tensor {
        &self.lora_a
    }

    pub fn lora_b(&self) -> &Tensor {
        &self.lora_b
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl Module for LoraLinear {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.base.parameters();
        params.push(&self.lora_a);
        params.push(&self.lora_b);
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.base.parameters_mut();
        params.push(&mut self.lora_a);
        params.push(&mut self.lora_b);
        params
    }
}
