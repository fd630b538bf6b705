//! Normalization autograd operations: row-wise layer_norm

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Layer Normalization over each row of a `rows × cols` matrix
///
/// LayerNorm(x) = gamma * (x - mean) / sqrt(var + epsilon) + beta, with mean and
/// (biased) variance taken per row and `gamma`, `beta` of length `cols`.
pub fn layer_norm(
    x: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    rows: usize,
    cols: usize,
    epsilon: f32,
) -> Tensor {
    assert_eq!(x.len(), rows * cols, "layer_norm input size mismatch");
    assert_eq!(gamma.len(), cols, "layer_norm gamma size mismatch");
    assert_eq!(beta.len(), cols, "layer_norm beta size mismatch");

    let x_slice = x.data().as_slice().expect("input must be contiguous");
    let g = gamma.data();
    let b = beta.data();
    let n = cols as f32;

    let mut normalized = vec![0.0f32; rows * cols];
    let mut inv_std = vec![0.0f32; rows];
    let mut data = vec![0.0f32; rows * cols];

    for r in 0..rows {
        let row = &x_slice[r * cols..(r + 1) * cols];
        let mean = row.iter().sum::<f32>() / n;
        let variance = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let istd = 1.0 / (variance + epsilon).sqrt();
        inv_std[r] = istd;
        for c in 0..cols {
            let norm = (row[c] - mean) * istd;
            normalized[r * cols + c] = norm;
            data[r * cols + c] = norm * g[c] + b[c];
        }
    }

    let requires_grad = x.requires_grad() || gamma.requires_grad() || beta.requires_grad();
    let mut result = Tensor::from_vec(data, requires_grad).reshape(x.shape());

    if requires_grad {
        let backward_op = Rc::new(LayerNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            normalized,
            inv_std,
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct LayerNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    normalized: Vec<f32>,
    inv_std: Vec<f32>,
    rows: usize,
    cols: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for LayerNormBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            let cols = self.cols;
            let n = cols as f32;
            let gamma = self.gamma.data();

            // ∂L/∂beta = column sums of ∂L/∂y, ∂L/∂gamma = column sums of ∂L/∂y * x̂
            if self.beta.requires_grad() || self.gamma.requires_grad() {
                let mut grad_gamma = Array1::<f32>::zeros(cols);
                let mut grad_beta = Array1::<f32>::zeros(cols);
                for r in 0..self.rows {
                    for c in 0..cols {
                        let idx = r * cols + c;
                        grad_beta[c] += grad_output[idx];
                        grad_gamma[c] += grad_output[idx] * self.normalized[idx];
                    }
                }
                if self.beta.requires_grad() {
                    self.beta.accumulate_grad(grad_beta);
                }
                if self.gamma.requires_grad() {
                    self.gamma.accumulate_grad(grad_gamma);
                }
            }

            if self.x.requires_grad() {
                // ∂L/∂x_i = istd * [ĝ_i - mean(ĝ) - x̂_i * mean(ĝ ⊙ x̂)], ĝ = ∂L/∂y ⊙ gamma
                let mut grad_x = vec![0.0f32; self.rows * cols];
                for r in 0..self.rows {
                    let base = r * cols;
                    let mut sum_grad = 0.0f32;
                    let mut sum_grad_norm = 0.0f32;
                    for c in 0..cols {
                        let gn = grad_output[base + c] * gamma[c];
                        sum_grad += gn;
                        sum_grad_norm += gn * self.normalized[base + c];
                    }
                    for c in 0..cols {
                        let gn = grad_output[base + c] * gamma[c];
                        let norm = self.normalized[base + c];
                        grad_x[base + c] =
                            self.inv_std[r] * (gn - sum_grad / n - norm * sum_grad_norm / n);
                    }
                }
                self.x.accumulate_grad(Array1::from(grad_x));
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.x, &self.gamma, &self.beta]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rows_normalized_independently() {
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0], false);
        let gamma = Tensor::from_vec(vec![1.0; 3], false);
        let beta = Tensor::from_vec(vec![0.0; 3], false);
        let y = layer_norm(&x, &gamma, &beta, 2, 3, 1e-5);

        for r in 0..2 {
            let row = &y.data().as_slice().unwrap()[r * 3..(r + 1) * 3];
            let mean: f32 = row.iter().sum::<f32>() / 3.0;
            let var: f32 = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 3.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-3);
        }
        // Same pattern in both rows after normalization
        assert_abs_diff_eq!(y.data()[0], y.data()[3], epsilon = 1e-4);
    }

    #[test]
    fn test_affine_applied_per_column() {
        let x = Tensor::from_vec(vec![-1.0, 1.0], false);
        let gamma = Tensor::from_vec(vec![2.0, 3.0], false);
        let beta = Tensor::from_vec(vec![0.5, -0.5], false);
        let y = layer_norm(&x, &gamma, &beta, 1, 2, 0.0);
        assert_abs_diff_eq!(y.data()[0], -1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(y.data()[1], 2.5, epsilon = 1e-6);
    }
}
