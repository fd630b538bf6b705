//! Tensor type with gradient tracking

use super::BackwardOp;
use ndarray::Array1;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Flat `f32` buffer with a logical shape and a shared gradient cell
///
/// Cloning a tensor is cheap and yields a handle to the same graph node: the
/// data buffer and gradient cell are reference counted. Writing through
/// [`Tensor::data_mut`] copies the buffer if a recorded graph still reads it.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<Array1<f32>>,
    shape: Vec<usize>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a 1-D tensor from an array
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data: Rc::new(data),
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor with an explicit row-major shape
    ///
    /// # Panics
    /// Panics if the shape does not cover exactly `data.len()` elements.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {shape:?} does not match {} elements",
            data.len()
        );
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Create a zero tensor with the given shape
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        let len = shape.iter().product();
        Self::from_shape_vec(shape, vec![0.0; len], requires_grad)
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutable access to the data buffer
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        Rc::make_mut(&mut self.data)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.to_vec()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Logical row-major shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Same graph node viewed with a different shape
    ///
    /// # Panics
    /// Panics if the element counts differ.
    pub fn reshape(&self, shape: &[usize]) -> Tensor {
        assert_eq!(
            shape.iter().product::<usize>(),
            self.len(),
            "cannot reshape {:?} into {shape:?}",
            self.shape
        );
        let mut view = self.clone();
        view.shape = shape.to_vec();
        view
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Builder form of [`Tensor::set_requires_grad`]
    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Toggle gradient tracking on a leaf tensor
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Current gradient, if any has been accumulated
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add to the accumulated gradient
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Shared gradient cell, captured by ops that produce this tensor
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.grad)
    }

    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Leaf tensor sharing this tensor's data, cut off from the graph
    pub fn detach(&self) -> Tensor {
        Self {
            data: Rc::clone(&self.data),
            shape: self.shape.clone(),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad: false,
        }
    }

    /// Graph node identity
    pub(crate) fn node_id(&self) -> usize {
        Rc::as_ptr(&self.grad) as usize
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("has_backward_op", &self.backward_op.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_vec() {
        let t = Tensor::from_shape_vec(&[2, 3], vec![0.0; 6], false);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_from_shape_vec_mismatch() {
        let _ = Tensor::from_shape_vec(&[2, 2], vec![0.0; 3], false);
    }

    #[test]
    fn test_reshape_shares_node() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let r = t.reshape(&[2, 2]);
        assert_eq!(r.shape(), &[2, 2]);
        r.accumulate_grad(Array1::ones(4));
        assert_eq!(t.grad().unwrap().to_vec(), vec![1.0; 4]);
        assert_eq!(t.node_id(), r.node_id());
    }

    #[test]
    fn test_detach_breaks_graph() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let d = t.detach();
        assert!(!d.requires_grad());
        assert!(d.backward_op().is_none());
        assert_ne!(t.node_id(), d.node_id());
        assert_eq!(d.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_data_mut_copies_when_shared() {
        let mut t = Tensor::from_vec(vec![1.0, 2.0], true);
        let snapshot = t.clone();
        t.data_mut()[0] = 5.0;
        assert_eq!(t.data()[0], 5.0);
        assert_eq!(snapshot.data()[0], 1.0);
    }

    #[test]
    fn test_zero_grad_clears() {
        let t = Tensor::zeros(&[3], true);
        t.set_grad(Array1::ones(3));
        assert!(t.grad().is_some());
        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_debug_format() {
        let t = Tensor::zeros(&[2, 2], true);
        let dbg = format!("{t:?}");
        assert!(dbg.contains("shape"));
        assert!(dbg.contains("requires_grad: true"));
    }
}
