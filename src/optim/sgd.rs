//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::{Array1, Zip};

/// SGD optimizer with optional momentum
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }
}

impl Optimizer for SGD {
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        if self.velocities.len() < params.len() {
            self.velocities.resize(params.len(), None);
        }
        let (lr, momentum) = (self.lr, self.momentum);

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };
            if momentum > 0.0 {
                // v = momentum·v − lr·g, θ += v
                let velocity = self.velocities[i].get_or_insert_with(|| Array1::zeros(grad.len()));
                Zip::from(param.data_mut())
                    .and(velocity)
                    .and(&grad)
                    .for_each(|p, v, &g| {
                        *v = momentum * *v - lr * g;
                        *p += *v;
                    });
            } else {
                param.data_mut().scaled_add(-lr, &grad);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_plain_step() {
        let mut opt = SGD::new(0.1, 0.0);
        let mut param = Tensor::from_vec(vec![1.0, 2.0], true);
        param.set_grad(arr1(&[0.5, -1.0]));

        opt.step_refs(&mut [&mut param]);

        let data = param.to_vec();
        assert_abs_diff_eq!(data[0], 0.95, epsilon = 1e-6);
        assert_abs_diff_eq!(data[1], 2.1, epsilon = 1e-6);
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut opt = SGD::new(0.1, 0.9);
        let mut param = Tensor::from_vec(vec![0.0], true);

        param.set_grad(arr1(&[1.0]));
        opt.step_refs(&mut [&mut param]);
        assert_abs_diff_eq!(param.to_vec()[0], -0.1, epsilon = 1e-6);

        // v = 0.9·(−0.1) − 0.1 = −0.19
        opt.step_refs(&mut [&mut param]);
        assert_abs_diff_eq!(param.to_vec()[0], -0.29, epsilon = 1e-6);
    }
}
