//! Loss functions

use crate::autograd::BackwardOp;
use crate::Tensor;
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

use super::TokenBatch;

/// Target value marking a position that does not contribute to the loss
pub const IGNORE_INDEX: f32 = -100.0;

/// Trait for loss functions
pub trait LossFn {
    /// Compute loss given predictions and targets
    ///
    /// Returns a scalar loss tensor wired into the autograd graph
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor;

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Causal Language Modeling Loss
///
/// Mean next-token cross-entropy over the positions whose target is not
/// [`IGNORE_INDEX`]:
/// L = −Σ log(softmax(logits)[target]) / counted_positions
///
/// # Example
///
/// ```
/// use rango::train::{CausalLMLoss, LossFn};
/// use rango::Tensor;
///
/// let loss_fn = CausalLMLoss::new(10);
/// let logits = Tensor::from_vec(vec![0.1; 3 * 10], true);
/// let targets = Tensor::from_vec(vec![0.0, 1.0, 2.0], false);
///
/// let loss = loss_fn.forward(&logits, &targets);
/// assert!((loss.data()[0] - 10f32.ln()).abs() < 1e-5);
/// ```
pub struct CausalLMLoss {
    vocab_size: usize,
}

impl CausalLMLoss {
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }

    /// Per-position targets for a self-labelled batch
    ///
    /// Position `t` predicts token `t + 1` of the same sequence; the last
    /// position of every sequence is ignored.
    pub fn shifted_targets(batch: &TokenBatch) -> Tensor {
        let t = batch.seq_len();
        let targets = batch
            .input_ids()
            .chunks_exact(t)
            .flat_map(|seq| {
                seq[1..]
                    .iter()
                    .map(|&id| id as f32)
                    .chain(std::iter::once(IGNORE_INDEX))
            })
            .collect();
        Tensor::from_vec(targets, false)
    }

    fn log_softmax(logits: &[f32]) -> Vec<f32> {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum = logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
        logits.iter().map(|&x| x - max - log_sum).collect()
    }
}

impl LossFn for CausalLMLoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        let vocab = self.vocab_size;
        let positions = targets.len();
        assert_eq!(
            predictions.len(),
            positions * vocab,
            "Predictions must be positions * vocab_size"
        );

        let logits = predictions.data().as_slice().expect("prediction data must be contiguous");
        let mut total = 0.0f32;
        let mut counted = 0usize;
        let mut grads = Array1::<f32>::zeros(predictions.len());

        for (pos, &target) in targets.data().iter().enumerate() {
            if target < 0.0 {
                continue;
            }
            let target = target as usize;
            assert!(target < vocab, "target id {target} outside vocabulary of {vocab}");

            let start = pos * vocab;
            let log_probs = Self::log_softmax(&logits[start..start + vocab]);
            total -= log_probs[target];
            counted += 1;

            // d/dlogits = softmax − one_hot(target)
            for (i, lp) in log_probs.iter().enumerate() {
                grads[start + i] = lp.exp() - if i == target { 1.0 } else { 0.0 };
            }
        }

        let norm = counted.max(1) as f32;
        grads /= norm;
        let requires_grad = predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![total / norm], requires_grad);

        if requires_grad {
            loss.set_backward_op(Rc::new(CausalLMBackward {
                predictions: predictions.clone(),
                grad: grads,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &'static str {
        "CausalLM"
    }
}

struct CausalLMBackward {
    predictions: Tensor,
    grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for CausalLMBackward {
    fn backward(&self) {
        if let Some(upstream) = self.result_grad.borrow().as_ref() {
            self.predictions.accumulate_grad(&self.grad * upstream[0]);
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.predictions]
    }
}
