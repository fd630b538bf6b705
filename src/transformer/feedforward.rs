//! Position-wise feed-forward network (GPT-2 MLP)

use crate::autograd::{gelu, Context};
use crate::error::Result;
use crate::lowrank::Projection;
use crate::nn::{Linear, Module};
use crate::Tensor;
use std::collections::HashMap;

use super::config::GptConfig;
use super::weights::linear_from_params;

/// `c_proj(gelu(c_fc(x)))`
#[derive(Debug, Clone)]
pub struct FeedForward {
    /// Expansion `[n_embd, 4·n_embd]`
    pub c_fc: Projection,
    /// Contraction `[4·n_embd, n_embd]`
    pub c_proj: Projection,
    dropout: f32,
}

impl FeedForward {
    pub fn new(config: &GptConfig, seed: u64) -> Self {
        let proj_std = config.initializer_range / (2.0 * config.n_layer as f32).sqrt();
        Self {
            c_fc: Linear::new(config.n_embd, config.n_inner(), config.initializer_range, seed)
                .into(),
            c_proj: Linear::new(config.n_inner(), config.n_embd, proj_std, seed.wrapping_add(1))
                .into(),
            dropout: config.dropout,
        }
    }

    /// Take `{prefix}.c_fc.*` and `{prefix}.c_proj.*` out of a loaded parameter map
    pub fn from_params(
        params: &mut HashMap<String, Tensor>,
        prefix: &str,
        config: &GptConfig,
    ) -> Result<Self> {
        Ok(Self {
            c_fc: linear_from_params(
                params,
                &format!("{prefix}.c_fc"),
                config.n_embd,
                config.n_inner(),
            )?
            .into(),
            c_proj: linear_from_params(
                params,
                &format!("{prefix}.c_proj"),
                config.n_inner(),
                config.n_embd,
            )?
            .into(),
            dropout: config.dropout,
        })
    }

    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        let hidden = gelu(&self.c_fc.forward(x, ctx));
        let out = self.c_proj.forward(&hidden, ctx);
        ctx.dropout(&out, self.dropout)
    }
}

impl Module for FeedForward {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.c_fc.parameters();
        params.extend(self.c_proj.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.c_fc.parameters_mut();
        params.extend(self.c_proj.parameters_mut());
        params
    }
}
