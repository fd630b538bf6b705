//! Transformer block module
//!
//! Pre-LayerNorm GPT-2 block:
//! `x + attn(ln_1(x))`, then `h + mlp(ln_2(h))`.

use crate::autograd::{add, Context};
use crate::error::{Error, Result};
use crate::lowrank::Projection;
use crate::nn::Module;
use crate::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::attention::CausalSelfAttention;
use super::config::GptConfig;
use super::feedforward::FeedForward;
use super::norm::LayerNorm;

/// Addressable projection inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sublayer {
    /// Fused QKV projection
    AttnCAttn,
    /// Attention output projection
    AttnCProj,
    /// MLP expansion
    MlpCFc,
    /// MLP contraction
    MlpCProj,
}

impl Sublayer {
    pub const ALL: [Sublayer; 4] = [
        Sublayer::AttnCAttn,
        Sublayer::AttnCProj,
        Sublayer::MlpCFc,
        Sublayer::MlpCProj,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttnCAttn => "attn_c_attn",
            Self::AttnCProj => "attn_c_proj",
            Self::MlpCFc => "mlp_c_fc",
            Self::MlpCProj => "mlp_c_proj",
        }
    }
}

impl fmt::Display for Sublayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sublayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| Error::UnknownSublayer(s.to_string()))
    }
}

impl TryFrom<String> for Sublayer {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Sublayer> for String {
    fn from(sub: Sublayer) -> Self {
        sub.as_str().to_string()
    }
}

/// Complete transformer block
#[derive(Debug, Clone)]
pub struct Block {
    pub ln_1: LayerNorm,
    pub attn: CausalSelfAttention,
    pub ln_2: LayerNorm,
    pub mlp: FeedForward,
}

impl Block {
    /// Create new block with randomly initialized weights
    pub fn new(config: &GptConfig, seed: u64) -> Self {
        Self {
            ln_1: LayerNorm::new(config.n_embd, config.layer_norm_epsilon),
            attn: CausalSelfAttention::new(config, seed),
            ln_2: LayerNorm::new(config.n_embd, config.layer_norm_epsilon),
            mlp: FeedForward::new(config, seed.wrapping_add(2)),
        }
    }

    /// Create block `layer_idx` from a loaded parameter map (`h.{i}.*` names)
    pub fn from_params(
        params: &mut HashMap<String, Tensor>,
        config: &GptConfig,
        layer_idx: usize,
    ) -> Result<Self> {
        let prefix = format!("h.{layer_idx}");
        let (dim, eps) = (config.n_embd, config.layer_norm_epsilon);
        Ok(Self {
            ln_1: LayerNorm::from_params(params, &format!("{prefix}.ln_1"), dim, eps)?,
            attn: CausalSelfAttention::from_params(params, &format!("{prefix}.attn"), config)?,
            ln_2: LayerNorm::from_params(params, &format!("{prefix}.ln_2"), dim, eps)?,
            mlp: FeedForward::from_params(params, &format!("{prefix}.mlp"), config)?,
        })
    }

    /// Forward over `batch * seq_len` rows of width `n_embd`
    pub fn forward(&self, x: &Tensor, batch: usize, seq_len: usize, ctx: &Context) -> Tensor {
        let attn_out = self.attn.forward(&self.ln_1.forward(x, ctx), batch, seq_len, ctx);
        let h = add(x, &attn_out);
        let mlp_out = self.mlp.forward(&self.ln_2.forward(&h, ctx), ctx);
        add(&h, &mlp_out)
    }

    pub fn slot(&self, sublayer: Sublayer) -> &Projection {
        match sublayer {
            Sublayer::AttnCAttn => &self.attn.c_attn,
            Sublayer::AttnCProj => &self.attn.c_proj,
            Sublayer::MlpCFc => &self.mlp.c_fc,
            Sublayer::MlpCProj => &self.mlp.c_proj,
        }
    }

    pub fn slot_mut(&mut self, sublayer: Sublayer) -> &mut Projection {
        match sublayer {
            Sublayer::AttnCAttn => &mut self.attn.c_attn,
            Sublayer::AttnCProj => &mut self.attn.c_proj,
            Sublayer::MlpCFc => &mut self.mlp.c_fc,
            Sublayer::MlpCProj => &mut self.mlp.c_proj,
        }
    }
}

impl Module for Block {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.ln_1.parameters();
        params.extend(self.attn.parameters());
        params.extend(self.ln_2.parameters());
        params.extend(self.mlp.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.ln_1.parameters_mut();
        params.extend(self.attn.parameters_mut());
        params.extend(self.ln_2.parameters_mut());
        params.extend(self.mlp.parameters_mut());
        params
    }
}
