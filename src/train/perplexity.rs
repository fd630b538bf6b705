//! Held-out perplexity evaluation

use crate::autograd::Context;
use crate::error::{Error, Result};
use crate::transformer::GptModel;

use super::TokenBatch;

/// Perplexity from a mean cross-entropy loss (natural log)
pub fn perplexity(loss: f64) -> f64 {
    loss.exp()
}

/// Weighted running average of batch losses
///
/// Each batch contributes `loss × weight`; the reported perplexity is
/// `exp(Σ loss·weight / Σ weight)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerplexityMeter {
    total_loss: f64,
    total_weight: f64,
}

impl PerplexityMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch's mean loss
    pub fn update(&mut self, loss: f64, weight: usize) {
        self.total_loss += loss * weight as f64;
        self.total_weight += weight as f64;
    }

    /// Weighted mean loss, `None` before any update
    pub fn mean_loss(&self) -> Option<f64> {
        (self.total_weight > 0.0).then(|| self.total_loss / self.total_weight)
    }

    pub fn perplexity(&self) -> Option<f64> {
        self.mean_loss().map(perplexity)
    }
}

/// Perplexity of `model` over `batches`
///
/// Runs in eval mode with gradient tracking disabled; the context's mode is
/// restored afterwards. Each batch is weighted by its sequence length.
///
/// # Errors
/// [`Error::InvalidArgument`] for an empty evaluation set, plus any forward
/// error.
pub fn evaluate_perplexity(model: &GptModel, batches: &[TokenBatch], ctx: &mut Context) -> Result<f64> {
    if batches.is_empty() {
        return Err(Error::InvalidArgument("evaluation set is empty".into()));
    }

    let (was_training, had_grad) = (ctx.is_training(), ctx.grad_enabled());
    ctx.eval();
    ctx.set_grad_enabled(false);

    let mut meter = PerplexityMeter::new();
    let outcome: Result<()> = batches.iter().try_for_each(|batch| {
        let loss = model.forward_with_labels(batch, ctx)?;
        meter.update(f64::from(loss.data()[0]), batch.seq_len());
        Ok(())
    });

    if was_training {
        ctx.train();
    }
    ctx.set_grad_enabled(had_grad);
    outcome?;

    meter
        .perplexity()
        .ok_or_else(|| Error::InvalidArgument("evaluation set is empty".into()))
}
