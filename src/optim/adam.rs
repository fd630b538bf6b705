//! Adam optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::{Array1, Zip};

/// Adam with bias-corrected moment estimates
///
/// m_t = β1·m + (1 − β1)·g, v_t = β2·v + (1 − β2)·g²,
/// θ ← θ − lr_t · m_t / (√v_t + ε) with lr_t = lr·√(1 − β2ᵗ) / (1 − β1ᵗ)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default betas (0.9, 0.999) and ε = 1e-8
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Number of steps taken
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;

        let t = self.t as i32;
        let lr_t =
            self.lr * ((1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t)));
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };
            let m = self.m[i].get_or_insert_with(|| Array1::zeros(grad.len()));
            let v = self.v[i].get_or_insert_with(|| Array1::zeros(grad.len()));

            Zip::from(param.data_mut())
                .and(m)
                .and(v)
                .and(&grad)
                .for_each(|p, m, v, &g| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *p -= lr_t * *m / (v.sqrt() + eps);
                });
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
    use crate::autograd::{backward, matmul, matrix_transpose};
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_first_step_moves_by_lr() {
        // With bias correction the first update is lr·sign(g)
        let mut opt = Adam::default_params(0.1);
        let mut param = Tensor::from_vec(vec![1.0, -1.0], true);
        param.set_grad(arr1(&[3.0, -0.5]));

        opt.step_refs(&mut [&mut param]);

        let data = param.to_vec();
        assert_abs_diff_eq!(data[0], 0.9, epsilon = 1e-4);
        assert_abs_diff_eq!(data[1], -0.9, epsilon = 1e-4);
        assert_eq!(opt.step_count(), 1);
    }

    #[test]
    fn test_skips_params_without_grad() {
        let mut opt = Adam::default_params(0.1);
        let mut a = Tensor::from_vec(vec![1.0], true);
        let mut b = Tensor::from_vec(vec![2.0], true);
        b.set_grad(arr1(&[1.0]));

        opt.step_refs(&mut [&mut a, &mut b]);

        assert_eq!(a.to_vec(), vec![1.0]);
        assert!(b.to_vec()[0] < 2.0);
    }

    #[test]
    fn test_minimizes_quadratic() {
        // f(w) = ‖x·w‖², minimum at w = 0
        let x = Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, -1.0, 0.5], false);
        let mut w = Tensor::from_shape_vec(&[2, 1], vec![1.5, -2.0], true);
        let mut opt = Adam::default_params(0.05);

        let loss = |w: &Tensor| {
            let y = matmul(&x, w, 2, 2, 1);
            matmul(&matrix_transpose(&y, 2, 1), &y, 1, 2, 1)
        };
        let initial = loss(&w).data()[0];

        for _ in 0..300 {
            let mut l = loss(&w);
            backward(&mut l, None);
            drop(l);
            opt.step_refs(&mut [&mut w]);
            w.zero_grad();
        }

        assert!(loss(&w).data()[0] < initial * 0.01);
    }
}
