//! Causal multi-head self-attention with a fused QKV projection

use crate::autograd::{causal_self_attention, Context};
use crate::error::Result;
use crate::lowrank::Projection;
use crate::nn::{Linear, Module};
use crate::Tensor;
use std::collections::HashMap;

use super::config::GptConfig;
use super::weights::linear_from_params;

/// GPT-2 attention: `c_attn` produces `[q | k | v]`, `c_proj` mixes heads
#[derive(Debug, Clone)]
pub struct CausalSelfAttention {
    /// Fused query/key/value projection `[n_embd, 3·n_embd]`
    pub c_attn: Projection,
    /// Output projection `[n_embd, n_embd]`
    pub c_proj: Projection,
    n_head: usize,
    head_dim: usize,
    dropout: f32,
}

impl CausalSelfAttention {
    pub fn new(config: &GptConfig, seed: u64) -> Self {
        let embd = config.n_embd;
        // Residual projections are scaled down by the depth
        let proj_std = config.initializer_range / (2.0 * config.n_layer as f32).sqrt();
        Self {
            c_attn: Linear::new(embd, 3 * embd, config.initializer_range, seed).into(),
            c_proj: Linear::new(embd, embd, proj_std, seed.wrapping_add(1)).into(),
            n_head: config.n_head,
            head_dim: config.head_dim(),
            dropout: config.dropout,
        }
    }

    /// Take `{prefix}.c_attn.*` and `{prefix}.c_proj.*` out of a loaded parameter map
    pub fn from_params(
        params: &mut HashMap<String, Tensor>,
        prefix: &str,
        config: &GptConfig,
    ) -> Result<Self> {
        let embd = config.n_embd;
        Ok(Self {
            c_attn: linear_from_params(params, &format!("{prefix}.c_attn"), embd, 3 * embd)?.into(),
            c_proj: linear_from_params(params, &format!("{prefix}.c_proj"), embd, embd)?.into(),
            n_head: config.n_head,
            head_dim: config.head_dim(),
            dropout: config.dropout,
        })
    }

    /// Attend over `batch` sequences of `seq_len` rows each
    pub fn forward(&self, x: &Tensor, batch: usize, seq_len: usize, ctx: &Context) -> Tensor {
        let qkv = self.c_attn.forward(x, ctx);
        let heads = causal_self_attention(&qkv, batch, seq_len, self.n_head, self.head_dim);
        let out = self.c_proj.forward(&heads, ctx);
        ctx.dropout(&out, self.dropout)
    }
}

impl Module for CausalSelfAttention {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.c_attn.parameters();
        params.extend(self.c_proj.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.c_attn.parameters_mut();
        params.extend(self.c_proj.parameters_mut());
        params
    }
}
