//! Embedding lookup with scatter-add backward

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Gather rows of a `num_embeddings × dim` table
///
/// # Panics
/// Panics if an index is out of range; callers validate token ids first.
pub fn embedding(weight: &Tensor, indices: &[u32], num_embeddings: usize, dim: usize) -> Tensor {
    assert_eq!(weight.len(), num_embeddings * dim, "embedding table size mismatch");
    let table = weight.data().as_slice().expect("embedding table must be contiguous");

    let mut data = Vec::with_capacity(indices.len() * dim);
    for &idx in indices {
        let idx = idx as usize;
        assert!(idx < num_embeddings, "embedding index {idx} out of range ({num_embeddings})");
        data.extend_from_slice(&table[idx * dim..(idx + 1) * dim]);
    }

    let requires_grad = weight.requires_grad();
    let mut result = Tensor::from_shape_vec(&[indices.len(), dim], data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(EmbeddingBackward {
            weight: weight.clone(),
            indices: indices.to_vec(),
            dim,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct EmbeddingBackward {
    weight: Tensor,
    indices: Vec<u32>,
    dim: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for EmbeddingBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.weight.requires_grad() {
                let mut grad_weight = Array1::<f32>::zeros(self.weight.len());
                for (row, &idx) in self.indices.iter().enumerate() {
                    let dst = idx as usize * self.dim;
                    for d in 0..self.dim {
                        grad_weight[dst + d] += grad[row * self.dim + d];
                    }
                }
                self.weight.accumulate_grad(grad_weight);
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.weight]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;

    #[test]
    fn test_gather_rows() {
        let table = Tensor::from_vec(vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0], false);
        let out = embedding(&table, &[2, 0, 2], 3, 2);
        assert_eq!(out.shape(), &[3, 2]);
        assert_eq!(out.to_vec(), vec![20.0, 21.0, 0.0, 1.0, 20.0, 21.0]);
    }

    #[test]
    fn test_repeated_index_accumulates() {
        let table = Tensor::from_vec(vec![0.0; 6], true);
        let mut out = embedding(&table, &[1, 1, 0], 3, 2);
        backward(&mut out, None);
        let grad = table.grad().unwrap();
        assert_eq!(grad.to_vec(), vec![1.0, 1.0, 2.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics() {
        let table = Tensor::from_vec(vec![0.0; 4], false);
        let _ = embedding(&table, &[2], 2, 2);
    }
}
