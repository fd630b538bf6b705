//! Attention autograd operations: causal multi-head self-attention

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Causal multi-head self-attention over a fused QKV projection
///
/// `qkv` holds `batch * seq_len` rows of width `3 * n_head * head_dim`, laid out
/// as `[q | k | v]` with heads contiguous inside each third (the GPT-2 `c_attn`
/// layout). Position `i` attends to positions `0..=i` of its own sequence.
///
/// Returns `batch * seq_len` rows of width `n_head * head_dim`.
pub fn causal_self_attention(
    qkv: &Tensor,
    batch: usize,
    seq_len: usize,
    n_head: usize,
    head_dim: usize,
) -> Tensor {
    let embd = n_head * head_dim;
    let width = 3 * embd;
    assert_eq!(qkv.len(), batch * seq_len * width, "qkv size mismatch");

    let scale = 1.0 / (head_dim as f32).sqrt();
    let src = qkv.data().as_slice().expect("qkv must be contiguous");
    let mut probs = vec![0.0f32; batch * n_head * seq_len * seq_len];
    let mut out = vec![0.0f32; batch * seq_len * embd];
    let mut scores = vec![0.0f32; seq_len];

    for b in 0..batch {
        for h in 0..n_head {
            let head = h * head_dim;
            for i in 0..seq_len {
                let q = &src[(b * seq_len + i) * width + head..][..head_dim];

                let mut max_score = f32::NEG_INFINITY;
                for (j, score) in scores.iter_mut().enumerate().take(i + 1) {
                    let k = &src[(b * seq_len + j) * width + embd + head..][..head_dim];
                    *score = q.iter().zip(k).map(|(a, b)| a * b).sum::<f32>() * scale;
                    max_score = max_score.max(*score);
                }

                let p_row = &mut probs[((b * n_head + h) * seq_len + i) * seq_len..][..seq_len];
                let mut total = 0.0f32;
                for j in 0..=i {
                    p_row[j] = (scores[j] - max_score).exp();
                    total += p_row[j];
                }

                let o = &mut out[(b * seq_len + i) * embd + head..][..head_dim];
                for j in 0..=i {
                    p_row[j] /= total;
                    let v = &src[(b * seq_len + j) * width + 2 * embd + head..][..head_dim];
                    for (o_d, v_d) in o.iter_mut().zip(v) {
                        *o_d += p_row[j] * v_d;
                    }
                }
            }
        }
    }

    let requires_grad = qkv.requires_grad();
    let mut result = Tensor::from_shape_vec(&[batch * seq_len, embd], out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(CausalAttentionBackward {
            qkv: qkv.clone(),
            probs,
            batch,
            seq_len,
            n_head,
            head_dim,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct CausalAttentionBackward {
    qkv: Tensor,
    probs: Vec<f32>,
    batch: usize,
    seq_len: usize,
    n_head: usize,
    head_dim: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for CausalAttentionBackward {
    fn backward(&self) {
        let Some(grad_output) = self.result_grad.borrow().as_ref().cloned() else {
            return;
        };
        if !self.qkv.requires_grad() {
            return;
        }

        let (t, hd) = (self.seq_len, self.head_dim);
        let embd = self.n_head * hd;
        let width = 3 * embd;
        let scale = 1.0 / (hd as f32).sqrt();
        let src = self.qkv.data().as_slice().expect("qkv must be contiguous");
        let go = grad_output.as_slice().expect("gradient must be contiguous");
        let mut grad = vec![0.0f32; src.len()];
        let mut dp = vec![0.0f32; t];

        for b in 0..self.batch {
            for h in 0..self.n_head {
                let head = h * hd;
                for i in 0..t {
                    let p_row = &self.probs[((b * self.n_head + h) * t + i) * t..][..t];
                    let g = &go[(b * t + i) * embd + head..][..hd];
                    let q_off = (b * t + i) * width + head;

                    // ∂L/∂P_ij = g_i · v_j, ∂L/∂v_j += P_ij g_i
                    let mut weighted = 0.0f32;
                    for j in 0..=i {
                        let v_off = (b * t + j) * width + 2 * embd + head;
                        dp[j] = g.iter().zip(&src[v_off..v_off + hd]).map(|(a, b)| a * b).sum();
                        weighted += p_row[j] * dp[j];
                        for d in 0..hd {
                            grad[v_off + d] += p_row[j] * g[d];
                        }
                    }

                    // Softmax Jacobian: ∂L/∂S_ij = P_ij (∂L/∂P_ij - Σ_l P_il ∂L/∂P_il)
                    for j in 0..=i {
                        let ds = p_row[j] * (dp[j] - weighted) * scale;
                        let k_off = (b * t + j) * width + embd + head;
                        for d in 0..hd {
                            grad[q_off + d] += ds * src[k_off + d];
                            grad[k_off + d] += ds * src[q_off + d];
                        }
                    }
                }
            }
        }

        self.qkv.accumulate_grad(Array1::from(grad));
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.qkv]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_first_position_copies_its_value() {
        // 1 batch, 2 positions, 1 head of dim 2: position 0 only sees itself
        let qkv = Tensor::from_vec(
            vec![
                1.0, 0.0, 1.0, 0.0, 3.0, 4.0, //
                0.0, 1.0, 0.0, 1.0, 5.0, 6.0,
            ],
            false,
        );
        let out = causal_self_attention(&qkv, 1, 2, 1, 2);
        assert_eq!(out.shape(), &[2, 2]);
        assert_abs_diff_eq!(out.data()[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.data()[1], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_equal_scores_average_values() {
        // Zero queries give uniform weights over the causal prefix
        let qkv = Tensor::from_vec(
            vec![
                0.0, 0.0, 2.0, //
                0.0, 0.0, 4.0,
            ],
            false,
        );
        let out = causal_self_attention(&qkv, 1, 2, 1, 1);
        assert_abs_diff_eq!(out.data()[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.data()[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_future_tokens_do_not_leak() {
        let base: Vec<f32> = (0..2 * 3 * 6).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut changed = base.clone();
        // Perturb the last position of the first sequence
        for v in &mut changed[2 * 6..3 * 6] {
            *v += 1.0;
        }
        let a = causal_self_attention(&Tensor::from_vec(base, false), 2, 3, 1, 2);
        let b = causal_self_attention(&Tensor::from_vec(changed, false), 2, 3, 1, 2);
        // Positions 0 and 1 of sequence 0, and all of sequence 1, are unchanged
        for idx in (0..2 * 2).chain(3 * 2..6 * 2) {
            assert_abs_diff_eq!(a.data()[idx], b.data()[idx], epsilon = 1e-6);
        }
    }
}
