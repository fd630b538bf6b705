//! Embedding layer module
//!
//! Token (`wte`) and learned position (`wpe`) tables.

use crate::autograd::{embedding, Context};
use crate::error::Result;
use crate::nn::{normal_init, Module};
use crate::Tensor;
use std::collections::HashMap;

use super::weights::take_param;

/// Embedding table `[num_embeddings, dim]`
#[derive(Debug, Clone)]
pub struct Embedding {
    /// Embedding weight (num_embeddings x dim)
    pub weight: Tensor,
    num_embeddings: usize,
    dim: usize,
}

impl Embedding {
    /// Create a table initialized from `N(0, std²)`
    pub fn new(num_embeddings: usize, dim: usize, std: f32, seed: u64) -> Self {
        Self {
            weight: Tensor::from_shape_vec(
                &[num_embeddings, dim],
                normal_init(num_embeddings * dim, std, seed),
                true,
            ),
            num_embeddings,
            dim,
        }
    }

    /// Take `name` out of a loaded parameter map
    pub fn from_params(
        params: &mut HashMap<String, Tensor>,
        name: &str,
        num_embeddings: usize,
        dim: usize,
    ) -> Result<Self> {
        let weight = take_param(params, name, &[num_embeddings, dim])?;
        Ok(Self {
            weight,
            num_embeddings,
            dim,
        })
    }

    /// Look up rows for `ids`, returning `[ids.len(), dim]`
    pub fn forward(&self, ids: &[u32], ctx: &Context) -> Tensor {
        embedding(&ctx.param(&self.weight), ids, self.num_embeddings, self.dim)
    }

    pub fn num_embeddings(&self) -> usize {
        self.num_embeddings
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Module for Embedding {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight]
    }
}
