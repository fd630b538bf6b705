//! Matrix multiplication autograd operations
//!
//! Matrices are row-major flat buffers; GEMM runs through `ndarray`'s `dot`.

use crate::autograd::{BackwardOp, Tensor};
use ndarray::{Array1, ArrayView2};
use std::cell::RefCell;
use std::rc::Rc;

/// Transpose a row-major matrix (rows x cols) to (cols x rows)
/// Uses cache-efficient blocked transpose for large matrices
#[inline]
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut transposed = vec![0.0f32; rows * cols];

    const BLOCK_SIZE: usize = 32;
    for r_block in (0..rows).step_by(BLOCK_SIZE) {
        for c_block in (0..cols).step_by(BLOCK_SIZE) {
            let r_end = (r_block + BLOCK_SIZE).min(rows);
            let c_end = (c_block + BLOCK_SIZE).min(cols);
            for r in r_block..r_end {
                for c in c_block..c_end {
                    transposed[c * rows + r] = data[r * cols + c];
                }
            }
        }
    }

    transposed
}

/// Compute `C = A @ B` on flat row-major buffers
pub fn matmul_compute(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let a = ArrayView2::from_shape((m, k), a).expect("matrix A buffer is m x k");
    let b = ArrayView2::from_shape((k, n), b).expect("matrix B buffer is k x n");
    a.dot(&b).iter().copied().collect()
}

/// Matrix multiplication
///
/// Computes C = A @ B where:
/// - A is m×k (flattened to length m*k)
/// - B is k×n (flattened to length k*n)
/// - C is m×n (flattened to length m*n)
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), k * n, "Matrix B size mismatch");

    let result_data = matmul_compute(
        a.data().as_slice().expect("matrix A must be contiguous"),
        b.data().as_slice().expect("matrix B must be contiguous"),
        m,
        k,
        n,
    );

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::from_shape_vec(&[m, n], result_data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            let grad_c = grad_output.as_slice().expect("gradient output must be contiguous");

            if self.a.requires_grad() {
                // ∂L/∂A = ∂L/∂C @ Bᵀ  (m×n) @ (n×k)
                let b_slice = self.b.data().as_slice().expect("matrix B must be contiguous");
                let b_t = transpose(b_slice, self.k, self.n);
                let grad_a = matmul_compute(grad_c, &b_t, self.m, self.n, self.k);
                self.a.accumulate_grad(Array1::from(grad_a));
            }

            if self.b.requires_grad() {
                // ∂L/∂B = Aᵀ @ ∂L/∂C  (k×m) @ (m×n)
                let a_slice = self.a.data().as_slice().expect("matrix A must be contiguous");
                let a_t = transpose(a_slice, self.m, self.k);
                let grad_b = matmul_compute(&a_t, grad_c, self.k, self.m, self.n);
                self.b.accumulate_grad(Array1::from(grad_b));
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }
}

/// Differentiable transpose of a `rows × cols` matrix
pub fn matrix_transpose(a: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(a.len(), rows * cols, "transpose size mismatch");
    let data = transpose(
        a.data().as_slice().expect("matrix must be contiguous"),
        rows,
        cols,
    );

    let requires_grad = a.requires_grad();
    let mut result = Tensor::from_shape_vec(&[cols, rows], data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(TransposeBackward {
            a: a.clone(),
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct TransposeBackward {
    a: Tensor,
    rows: usize,
    cols: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for TransposeBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_slice = grad.as_slice().expect("gradient must be contiguous");
                let grad_a = transpose(grad_slice, self.cols, self.rows);
                self.a.accumulate_grad(Array1::from(grad_a));
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }
}
