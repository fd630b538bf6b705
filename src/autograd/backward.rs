//! Backward operation trait and graph traversal

use super::Tensor;
use std::collections::HashSet;
use std::rc::Rc;

/// Trait for backward operations in the computational graph
///
/// An op reads the gradient of the tensor it produced and accumulates the
/// contribution of each input. It never recurses: [`super::backward`] drives
/// ops in reverse topological order so that shared subgraphs (residual
/// connections, a weight read twice) see their full gradient exactly once.
pub trait BackwardOp {
    /// Accumulate gradients into this op's inputs
    fn backward(&self);

    /// Tensors this op reads, used to order the backward pass
    fn inputs(&self) -> Vec<&Tensor>;
}

/// Collect the ops reachable from `root`, outputs before the inputs they read
pub(crate) fn topological_order(root: &Tensor) -> Vec<Rc<dyn BackwardOp>> {
    let mut order: Vec<Rc<dyn BackwardOp>> = Vec::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut stack: Vec<(Tensor, bool)> = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        let Some(op) = node.backward_op() else {
            continue;
        };
        if expanded {
            order.push(op);
            continue;
        }
        if !visited.insert(node.node_id()) {
            continue;
        }
        stack.push((node.clone(), true));
        for input in op.inputs() {
            if input.backward_op().is_some() && !visited.contains(&input.node_id()) {
                stack.push((input.clone(), false));
            }
        }
    }

    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{add, backward, scale};

    #[test]
    fn test_order_visits_each_op_once() {
        let x = Tensor::from_vec(vec![1.0, 2.0], true);
        let h = scale(&x, 2.0);
        let y = add(&h, &h);
        let order = topological_order(&y);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_leaf_has_empty_order() {
        let x = Tensor::from_vec(vec![1.0], true);
        assert!(topological_order(&x).is_empty());
    }

    #[test]
    fn test_diamond_gradient_not_double_counted() {
        // y = 2x + 3x, dy/dx = 5
        let x = Tensor::from_vec(vec![1.0, -1.0], true);
        let a = scale(&x, 2.0);
        let b = scale(&x, 3.0);
        let mut y = add(&a, &b);
        backward(&mut y, None);
        let grad = x.grad().unwrap();
        assert_eq!(grad.to_vec(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_residual_chain_gradient() {
        // h1 = x + 2x = 3x, h2 = h1 + 2*h1 = 9x
        let x = Tensor::from_vec(vec![0.5], true);
        let h1 = add(&x, &scale(&x, 2.0));
        let mut h2 = add(&h1, &scale(&h1, 2.0));
        backward(&mut h2, None);
        assert_eq!(x.grad().unwrap()[0], 9.0);
    }
}
