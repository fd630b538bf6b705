//! Rango: low-rank substitution and fine-tuning for transformer language models
//!
//! Rango replaces the linear projections of a GPT-2 style model with low-rank
//! counterparts and fine-tunes the result:
//!
//! - [`lowrank::SvdLinear`]: truncated SVD factorization `x·(U·S)·Vᵗ + b`, only `V`
//!   and the bias stay trainable
//! - [`lowrank::LoraLinear`]: additive adaptation `x·(W + A·B) + b`
//! - [`patch`]: swaps addressed `(block, sublayer)` slots and reports the
//!   trainable-parameter delta
//! - [`train`]: fine-tuning loop and held-out perplexity
//!
//! Everything runs on a small tape-based autograd engine ([`autograd`]) over
//! `ndarray` buffers.
//!
//! # Example
//!
//! ```
//! use rango::autograd::Context;
//! use rango::patch::apply_low_rank;
//! use rango::transformer::{GptConfig, GptModel, Sublayer};
//! use rango::{ComputeDevice, LowRankMethod};
//!
//! let mut model = GptModel::new(&GptConfig::tiny(), 42).unwrap();
//! let delta = apply_low_rank(
//!     &mut model,
//!     &[0, 1],
//!     &[2, 2],
//!     &[Sublayer::AttnCProj, Sublayer::MlpCFc],
//!     &ComputeDevice::Cpu,
//!     LowRankMethod::Svd,
//! )
//! .unwrap();
//! assert!(delta.after < delta.before);
//! assert_eq!(model.num_layers(), 2);
//! let _ctx = Context::new(ComputeDevice::Cpu);
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod linalg;
pub mod lowrank;
pub mod nn;
pub mod optim;
pub mod patch;
pub mod tokenizer;
pub mod train;
pub mod transformer;

pub use autograd::Tensor;
pub use device::ComputeDevice;
pub use error::{Error, Result};
pub use lowrank::LowRankMethod;
