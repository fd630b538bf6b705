//! Fine-tuning loop

use crate::autograd::{backward, Context};
use crate::error::{Error, Result};
use crate::nn::Module;
use crate::optim::Optimizer;
use crate::transformer::GptModel;

use super::{evaluate_perplexity, TokenBatch};

/// Metrics for one completed epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// One-based epoch number, as printed in the progress line
    pub epoch: usize,
    /// Mean training loss over the epoch's batches
    pub mean_loss: f32,
    /// Held-out perplexity after the epoch
    pub perplexity: f64,
}

/// Gradient-descent fine-tuning with per-epoch perplexity
///
/// # Example
///
/// ```no_run
/// use rango::autograd::Context;
/// use rango::optim::Adam;
/// use rango::train::{FineTuner, TokenBatch};
/// use rango::transformer::{GptConfig, GptModel};
///
/// let mut model = GptModel::new(&GptConfig::tiny(), 0)?;
/// let batches = TokenBatch::chunk_stream(&[1, 2, 3, 4, 5, 6, 7, 8], 4, 2)?;
/// let mut tuner = FineTuner::new(Box::new(Adam::default_params(1e-3)), 3);
/// let reports = tuner.fit(&mut model, &batches, &batches, &mut Context::default())?;
/// assert_eq!(reports.len(), 3);
/// # Ok::<(), rango::Error>(())
/// ```
pub struct FineTuner {
    optimizer: Box<dyn Optimizer>,
    epochs: usize,
}

impl FineTuner {
    pub fn new(optimizer: Box<dyn Optimizer>, epochs: usize) -> Self {
        Self { optimizer, epochs }
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    /// Train `model` on `train` for the configured number of epochs
    ///
    /// Every batch is its own label. After each epoch the model is evaluated
    /// on `eval` and one progress line is printed.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty training or evaluation set;
    /// forward errors propagate.
    pub fn fit(
        &mut self,
        model: &mut GptModel,
        train: &[TokenBatch],
        eval: &[TokenBatch],
        ctx: &mut Context,
    ) -> Result<Vec<EpochReport>> {
        if train.is_empty() {
            return Err(Error::InvalidArgument("training set is empty".into()));
        }
        if eval.is_empty() {
            return Err(Error::InvalidArgument("evaluation set is empty".into()));
        }

        model.zero_grad();
        let mut reports = Vec::with_capacity(self.epochs);

        for epoch in 1..=self.epochs {
            ctx.train();
            ctx.set_grad_enabled(true);

            let mut total_loss = 0.0f32;
            for batch in train {
                total_loss += self.train_step(model, batch, ctx)?;
            }
            let mean_loss = total_loss / train.len() as f32;

            let perplexity = evaluate_perplexity(model, eval, ctx)?;
            let report = EpochReport {
                epoch,
                mean_loss,
                perplexity,
            };
            println!("{}", progress_line(&report, self.epochs));
            reports.push(report);
        }

        Ok(reports)
    }

    /// Forward, backward, update and clear gradients; returns the batch loss
    fn train_step(&mut self, model: &mut GptModel, batch: &TokenBatch, ctx: &Context) -> Result<f32> {
        let mut loss = model.forward_with_labels(batch, ctx)?;
        let value = loss.data()[0];
        backward(&mut loss, None);
        // Release the graph so parameter buffers are uniquely owned again
        drop(loss);

        let mut params = model.trainable_parameters_mut();
        self.optimizer.step_refs(&mut params);
        self.optimizer.zero_grad_refs(&mut params);
        Ok(value)
    }
}

fn progress_line(report: &EpochReport, epochs: usize) -> String {
    format!(
        "Epoch {}/{}: loss={:.6}, perplexity={:.2}",
        report.epoch, epochs, report.mean_loss, report.perplexity
    )
}
