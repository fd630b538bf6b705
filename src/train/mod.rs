//! Fine-tuning and evaluation
//!
//! - [`TokenBatch`]: self-labelled batches of token ids
//! - [`CausalLMLoss`]: shifted next-token cross-entropy
//! - [`FineTuner`]: epoch loop with an optimizer over trainable parameters
//! - [`evaluate_perplexity`]: sequence-length weighted held-out perplexity

mod batch;
mod loss;
mod perplexity;
mod trainer;

pub use batch::TokenBatch;
pub use loss::{CausalLMLoss, LossFn, IGNORE_INDEX};
pub use perplexity::{evaluate_perplexity, perplexity, PerplexityMeter};
pub use trainer::{EpochReport, FineTuner};
