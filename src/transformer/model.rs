//! GPT-2 language model
//!
//! Token and position embeddings, a stack of pre-LN blocks, a final LayerNorm
//! and an output head tied to the token embedding.

use crate::autograd::{add, matmul, matrix_transpose, Context};
use crate::device::ComputeDevice;
use crate::error::{Error, Result};
use crate::lowrank::Projection;
use crate::nn::Module;
use crate::train::{CausalLMLoss, LossFn, TokenBatch};
use crate::Tensor;
use std::collections::HashMap;

use super::block::{Block, Sublayer};
use super::config::GptConfig;
use super::embedding::Embedding;
use super::norm::LayerNorm;

/// Decoder-only transformer with addressable projection slots
#[derive(Debug, Clone)]
pub struct GptModel {
    config: GptConfig,
    pub wte: Embedding,
    pub wpe: Embedding,
    pub blocks: Vec<Block>,
    pub ln_f: LayerNorm,
    device: ComputeDevice,
}

impl GptModel {
    /// Randomly initialized model, reproducible for a given seed
    pub fn new(config: &GptConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let std = config.initializer_range;
        let blocks = (0..config.n_layer)
            .map(|i| Block::new(config, seed.wrapping_add(16 * (i as u64 + 1))))
            .collect();
        Ok(Self {
            config: config.clone(),
            wte: Embedding::new(config.vocab_size, config.n_embd, std, seed),
            wpe: Embedding::new(config.n_positions, config.n_embd, std / 2.0, seed.wrapping_add(1)),
            blocks,
            ln_f: LayerNorm::new(config.n_embd, config.layer_norm_epsilon),
            device: ComputeDevice::Cpu,
        })
    }

    /// Build from a parameter map with GPT-2 names (`wte.weight`, `h.{i}.*`, `ln_f.*`)
    ///
    /// # Errors
    /// [`Error::Weights`] when a tensor is missing or has the wrong shape.
    pub fn from_params(config: &GptConfig, mut params: HashMap<String, Tensor>) -> Result<Self> {
        config.validate()?;
        let (vocab, embd) = (config.vocab_size, config.n_embd);
        let wte = Embedding::from_params(&mut params, "wte.weight", vocab, embd)?;
        let wpe = Embedding::from_params(&mut params, "wpe.weight", config.n_positions, embd)?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::from_params(&mut params, config, i))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = LayerNorm::from_params(&mut params, "ln_f", embd, config.layer_norm_epsilon)?;

        Ok(Self {
            config: config.clone(),
            wte,
            wpe,
            blocks,
            ln_f,
            device: ComputeDevice::Cpu,
        })
    }

    pub fn config(&self) -> &GptConfig {
        &self.config
    }

    /// Number of transformer blocks
    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Move every parameter to `device`
    ///
    /// # Errors
    /// [`Error::UnsupportedDevice`] when the device cannot host tensors.
    pub fn to_device(&mut self, device: ComputeDevice) -> Result<()> {
        device.ensure_available()?;
        self.device = device;
        Ok(())
    }

    /// Projection at `(layer, sublayer)`
    pub fn slot(&self, layer: usize, sublayer: Sublayer) -> Result<&Projection> {
        let num_layers = self.num_layers();
        self.blocks
            .get(layer)
            .map(|block| block.slot(sublayer))
            .ok_or(Error::LayerIndexOutOfRange {
                index: layer,
                num_layers,
            })
    }

    pub fn slot_mut(&mut self, layer: usize, sublayer: Sublayer) -> Result<&mut Projection> {
        let num_layers = self.num_layers();
        self.blocks
            .get_mut(layer)
            .map(|block| block.slot_mut(sublayer))
            .ok_or(Error::LayerIndexOutOfRange {
                index: layer,
                num_layers,
            })
    }

    /// Next-token logits `[batch·seq_len, vocab_size]`
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if the batch is longer than `n_positions` or
    /// holds a token id outside the vocabulary.
    pub fn forward(&self, batch: &TokenBatch, ctx: &Context) -> Result<Tensor> {
        self.check_batch(batch)?;
        let (b, t) = (batch.batch_size(), batch.seq_len());
        let (vocab, embd) = (self.config.vocab_size, self.config.n_embd);

        let positions: Vec<u32> = (0..b).flat_map(|_| 0..t as u32).collect();
        let tokens = self.wte.forward(batch.input_ids(), ctx);
        let pos = self.wpe.forward(&positions, ctx);
        let mut h = ctx.dropout(&add(&tokens, &pos), self.config.dropout);

        for block in &self.blocks {
            h = block.forward(&h, b, t, ctx);
        }
        let h = self.ln_f.forward(&h, ctx);

        // Output head shares the token embedding table
        let head = matrix_transpose(&ctx.param(&self.wte.weight), vocab, embd);
        Ok(matmul(&h, &head, b * t, embd, vocab))
    }

    /// Causal LM loss with the batch as its own labels
    ///
    /// Scalar mean cross-entropy over the `batch_size · (seq_len − 1)`
    /// next-token predictions.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for sequences shorter than two tokens, plus
    /// everything [`GptModel::forward`] rejects.
    pub fn forward_with_labels(&self, batch: &TokenBatch, ctx: &Context) -> Result<Tensor> {
        if batch.seq_len() < 2 {
            return Err(Error::InvalidArgument(
                "causal LM loss needs sequences of at least two tokens".into(),
            ));
        }
        let logits = self.forward(batch, ctx)?;
        let targets = CausalLMLoss::shifted_targets(batch);
        Ok(CausalLMLoss::new(self.config.vocab_size).forward(&logits, &targets))
    }

    fn check_batch(&self, batch: &TokenBatch) -> Result<()> {
        if batch.seq_len() > self.config.n_positions {
            return Err(Error::InvalidArgument(format!(
                "sequence length {} exceeds n_positions {}",
                batch.seq_len(),
                self.config.n_positions
            )));
        }
        if let Some(&id) = batch
            .input_ids()
            .iter()
            .find(|&&id| id as usize >= self.config.vocab_size)
        {
            return Err(Error::InvalidArgument(format!(
                "token id {id} outside vocabulary of {}",
                self.config.vocab_size
            )));
        }
        Ok(())
    }
}

impl Module for GptModel {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.wte.parameters();
        params.extend(self.wpe.parameters());
        for block in &self.blocks {
            params.extend(block.parameters());
        }
        params.extend(self.ln_f.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.wte.parameters_mut();
        params.extend(self.wpe.parameters_mut());
        for block in &mut self.blocks {
            params.extend(block.parameters_mut());
        }
        params.extend(self.ln_f.parameters_mut());
        params
    }
}
