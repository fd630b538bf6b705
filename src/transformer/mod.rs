//! GPT-2 architecture on the tape-based autograd engine
//!
//! ## Components
//!
//! - [`GptConfig`]: model dimensions and presets (`gpt2`, `gpt2-medium`, `distilgpt2`, `tiny`)
//! - [`CausalSelfAttention`]: fused QKV projection, causal softmax attention, output projection
//! - [`FeedForward`]: GELU MLP
//! - [`Block`]: pre-LayerNorm residual block with four addressable [`Sublayer`] slots
//! - [`GptModel`]: embeddings, block stack, final LayerNorm and tied output head
//!
//! Projections follow the `Conv1D` convention: weights are stored `[in, out]`.
//!
//! ## Example
//!
//! ```
//! use rango::autograd::Context;
//! use rango::train::TokenBatch;
//! use rango::transformer::{GptConfig, GptModel};
//!
//! let config = GptConfig::tiny();
//! let model = GptModel::new(&config, 0)?;
//! let batch = TokenBatch::new(vec![1, 2, 3], 1, 3)?;
//! let logits = model.forward(&batch, &Context::default())?;
//! assert_eq!(logits.shape(), &[3, config.vocab_size]);
//! # Ok::<(), rango::Error>(())
//! ```

mod attention;
mod block;
mod config;
mod embedding;
mod feedforward;
mod model;
mod norm;
mod weights;

pub use attention::CausalSelfAttention;
pub use block::{Block, Sublayer};
pub use config::GptConfig;
pub use embedding::Embedding;
pub use feedforward::FeedForward;
pub use model::GptModel;
pub use norm::LayerNorm;
pub use weights::load_safetensors_weights;
