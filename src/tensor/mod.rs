//! # Tensor Module
//!
//! This module defines the `Tensor` handle the optimizers work on: a shared
//! value array plus an optional gradient array of the same shape.
//!
//! Gradients are produced elsewhere (an autograd engine, a hand-written
//! backward pass, a test). The optimizer only reads them.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// --- Submodules ---
pub mod ops;

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("ndarray error: {0}")]
    Ndarray(#[from] ndarray::ShapeError),
}

// Define a type alias for the underlying data type (e.g., f32)
pub type TensorData = f32;

/// # Tensor
///
/// A parameter tensor: value storage plus an optional gradient.
///
/// Cloning a `Tensor` clones the handle, not the data. The training loop keeps
/// one handle and hands another to the optimizer; both see the same values.
#[derive(Clone, Debug)]
pub struct Tensor {
    // `data` holds the actual numerical values.
    data: Arc<RwLock<ArrayD<TensorData>>>,
    // `grad` is `None` until something populates it.
    grad: Arc<RwLock<Option<ArrayD<TensorData>>>>,
}

impl Tensor {
    /// Creates a new Tensor from an ndarray::ArrayD. No gradient is attached.
    pub fn new(data: ArrayD<TensorData>) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(data)),
            grad: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a Tensor of the given shape from row-major values.
    pub fn from_vec(shape: &[usize], values: Vec<TensorData>) -> Result<Self, TensorError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Self::new(data))
    }

    /// Creates a zero-dimensional tensor holding `value`.
    pub fn scalar(value: TensorData) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> Vec<usize> {
        self.data.read().shape().to_vec()
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.read().ndim()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    /// Returns the single element of a one-element tensor.
    pub fn item(&self) -> Option<TensorData> {
        let data = self.data.read();
        if data.len() == 1 {
            data.iter().next().copied()
        } else {
            None
        }
    }

    /// Provides read-only access to the underlying data.
    pub fn data(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read()
    }

    /// Provides mutable access to the underlying data.
    ///
    /// Replacing the array with one of a different shape is allowed, but any
    /// optimizer state already built for this tensor will then reject it.
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.data.write()
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data.read().clone()
    }

    /// Whether two handles share the same value storage.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    // --- Gradient access ---

    /// Retrieves a copy of the gradient, if one is present.
    pub fn grad(&self) -> Option<ArrayD<TensorData>> {
        self.grad.read().clone()
    }

    /// Whether a gradient is currently attached.
    pub fn has_grad(&self) -> bool {
        self.grad.read().is_some()
    }

    /// Borrows the gradient slot without copying it.
    pub(crate) fn grad_guard(&self) -> RwLockReadGuard<'_, Option<ArrayD<TensorData>>> {
        self.grad.read()
    }

    /// Replaces the gradient. The gradient must have the value's shape.
    pub fn set_grad(&self, grad: ArrayD<TensorData>) -> Result<(), TensorError> {
        ops::ensure_same_shape(self.data.read().shape(), grad.shape())?;
        *self.grad.write() = Some(grad);
        Ok(())
    }

    /// Accumulates into the gradient, starting from zeros if none is present.
    ///
    /// A stored gradient left over from before the value changed shape is
    /// rejected rather than broadcast.
    pub fn accumulate_grad(&self, incoming: &ArrayD<TensorData>) -> Result<(), TensorError> {
        let shape = self.shape();
        ops::ensure_same_shape(&shape, incoming.shape())?;

        let mut grad = self.grad.write();
        let existing = grad.get_or_insert_with(|| ArrayD::zeros(IxDyn(&shape)));
        ops::ensure_same_shape(existing.shape(), incoming.shape())?;
        *existing += incoming;
        Ok(())
    }

    /// Fills the gradient with zeros if it exists.
    /// If no gradient exists yet, nothing happens.
    pub fn zero_grad(&self) {
        if let Some(grad) = self.grad.write().as_mut() {
            grad.fill(0.0 as TensorData);
        }
    }

    /// Drops the gradient entirely.
    pub fn clear_grad(&self) {
        *self.grad.write() = None;
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)))
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let a = Tensor::from_vec(&[2], vec![1.0, 2.0]).unwrap();
        let b = a.clone();
        b.data_mut()[[0]] = 5.0;
        assert_eq!(a.data()[[0]], 5.0);
        assert!(a.ptr_eq(&b));

        b.set_grad(ArrayD::ones(IxDyn(&[2]))).unwrap();
        assert!(a.has_grad());
    }

    #[test]
    fn set_grad_rejects_wrong_shape() {
        let t = zeros(&[2, 3]);
        let err = t.set_grad(ArrayD::zeros(IxDyn(&[3, 2]))).unwrap_err();
        match err {
            TensorError::ShapeMismatch { expected, got } => {
                assert_eq!(expected, vec![2, 3]);
                assert_eq!(got, vec![3, 2]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!t.has_grad());
    }

    #[test]
    fn accumulate_grad_starts_from_zero() {
        let t = ones(&[3]);
        let g = ArrayD::from_elem(IxDyn(&[3]), 0.5);
        t.accumulate_grad(&g).unwrap();
        t.accumulate_grad(&g).unwrap();
        assert!(t.grad().unwrap().iter().all(|&x| (x - 1.0).abs() < 1e-6));

        t.zero_grad();
        assert!(t.grad().unwrap().iter().all(|&x| x == 0.0));
        t.clear_grad();
        assert!(!t.has_grad());
    }

    #[test]
    fn accumulate_grad_rejects_stale_gradient() {
        let t = ones(&[2]);
        t.set_grad(ArrayD::from_elem(IxDyn(&[2]), 1.0)).unwrap();
        *t.data_mut() = ArrayD::ones(IxDyn(&[3]));

        let result = t.accumulate_grad(&ArrayD::ones(IxDyn(&[3])));
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
        assert_eq!(t.grad().unwrap().shape(), &[2]);

        t.clear_grad();
        t.accumulate_grad(&ArrayD::ones(IxDyn(&[3]))).unwrap();
        assert_eq!(t.grad().unwrap().shape(), &[3]);
    }

    #[test]
    fn scalar_item() {
        assert_eq!(Tensor::scalar(1.5).item(), Some(1.5));
        assert_eq!(zeros(&[2]).item(), None);
        assert_eq!(Tensor::scalar(0.0).ndim(), 0);
    }
}
