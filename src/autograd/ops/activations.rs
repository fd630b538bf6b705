//! Activation function autograd operations

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

const SQRT_2_OVER_PI: f32 = 0.797_884_6;
const COEFF: f32 = 0.044_715;

/// GELU activation (Gaussian Error Linear Unit), tanh approximation
///
/// GELU(x) ≈ 0.5 * x * (1 + tanh(√(2/π) * (x + 0.044715 * x³)))
pub fn gelu(a: &Tensor) -> Tensor {
    let data = a
        .data()
        .mapv(|x| 0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + COEFF * x * x * x)).tanh()));

    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(data, requires_grad).reshape(a.shape());

    if requires_grad {
        let backward_op = Rc::new(GeluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct GeluBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for GeluBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂GELU/∂x = 0.5 * (1 + tanh(z)) + 0.5 * x * sech²(z) * dz/dx
                // where z = √(2/π) * (x + 0.044715 * x³)
                let grad_a: Array1<f32> = self
                    .a
                    .data()
                    .iter()
                    .zip(grad_output.iter())
                    .map(|(&x, &grad)| {
                        let x2 = x * x;
                        let z = SQRT_2_OVER_PI * (x + COEFF * x2 * x);
                        let tanh_z = z.tanh();
                        let sech2_z = 1.0 - tanh_z * tanh_z;
                        let dz_dx = SQRT_2_OVER_PI * (1.0 + 3.0 * COEFF * x2);
                        grad * (0.5 * (1.0 + tanh_z) + 0.5 * x * sech2_z * dz_dx)
                    })
                    .collect();

                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gelu_reference_values() {
        let x = Tensor::from_vec(vec![0.0, 1.0, -1.0, 3.0], false);
        let y = gelu(&x);
        assert_abs_diff_eq!(y.data()[0], 0.0);
        assert_abs_diff_eq!(y.data()[1], 0.841_192, epsilon = 1e-4);
        assert_abs_diff_eq!(y.data()[2], -0.158_808, epsilon = 1e-4);
        assert_abs_diff_eq!(y.data()[3], 2.996_363, epsilon = 1e-4);
    }

    #[test]
    fn test_gelu_preserves_shape() {
        let x = Tensor::from_shape_vec(&[2, 2], vec![0.1, 0.2, 0.3, 0.4], false);
        assert_eq!(gelu(&x).shape(), &[2, 2]);
    }
}
