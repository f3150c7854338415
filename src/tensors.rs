//! Core tensor data structures.
//!
//! # Tensors in this crate
//!
//! Every operation consumes and produces `(N, C, H, W)` tensors stored as a
//! flat row-major buffer next to their shape. The layout is deliberately
//! plain: a `Vec<usize>` shape and a `Vec<T>` of elements.
//!
//! - `Tensor<T>` is generic, `Ten64` is the `f64` tensor every kernel uses
//! - `WithGrad<T>` pairs a learnable parameter with its gradient slot
//! - The `tensor!` macro builds tensors from nested literals
//! - `Ten64::try_new` validates untrusted buffers instead of panicking
//!
//! ## Example
//!
//! ```rust
//! use cellops::tensors::Tensor;
//! let t = Tensor::new(vec![1, 2, 1, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![1, 2, 1, 3]);
//! assert_eq!(t.dims4(), (1, 2, 1, 3));
//! ```

use briny::prelude::{TrustedData, Validate, ValidationError};

use crate::error::{OpError, Result};
use crate::shape::Shape4;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g. `[2, 16, 32, 32]` for a batch of two
///   16-channel 32×32 feature maps.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The element type every kernel operates on.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interprets the tensor as `(N, C, H, W)`.
    ///
    /// # Panics
    /// Panics if the tensor is not rank 4.
    pub fn dims4(&self) -> (usize, usize, usize, usize) {
        assert_eq!(self.shape.len(), 4, "expected an (N, C, H, W) tensor, got shape {:?}", self.shape);
        (self.shape[0], self.shape[1], self.shape[2], self.shape[3])
    }

    /// Shape as a [`Shape4`].
    pub fn shape4(&self) -> Shape4 {
        let (n, c, h, w) = self.dims4();
        Shape4::new(n, c, h, w)
    }
}

impl<T: Clone + Default> Tensor<T> {
    /// A tensor filled with `T::default()`.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self { shape, data: vec![T::default(); len] }
    }
}

impl Ten64 {
    /// A tensor filled with `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: f64) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self { shape, data: vec![value; len] }
    }

    /// Fallible counterpart of [`Tensor::new`] for buffers coming from outside
    /// the crate (a data pipeline, a deserializer).
    ///
    /// # Errors
    /// Returns [`OpError::MalformedTensor`] if `data` does not fill `shape`.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Result<Self> {
        let raw = RawTensor { shape: shape.into(), data };
        let shape = raw.shape.clone();
        let len = raw.data.len();
        let trusted = TrustedData::new(raw).map_err(|_| OpError::MalformedTensor { shape, len })?;
        let RawTensor { shape, data } = trusted.into_inner();
        Ok(Self { shape, data })
    }

    /// Whether every element is exactly zero.
    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|&x| x == 0.0)
    }
}

/// Unvalidated tensor parts.
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Validate for RawTensor {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or(ValidationError)?;
        if self.data.len() != expected {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// A learnable value together with its gradient.
///
/// Operations own their parameters as `WithGrad<Ten64>`; the gradient slot is
/// filled by an external autograd collaborator and consumed by an optimizer.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps `value` with a zeroed gradient of the same shape.
    pub fn new(value: Ten64) -> Self {
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }

    /// Resets the gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad.data.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Performs SGD update in-place: `value -= lr * grad`, then resets the gradient.
    pub fn sgd(&mut self, lr: f64) {
        for (w, g) in self.value.data.iter_mut().zip(&self.grad.data) {
            *w -= lr * *g;
        }
        self.zero_grad();
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use cellops::tensor;
/// let t = tensor!([[[[1.0, 2.0], [3.0, 4.0]]]]);
/// assert_eq!(t.shape, vec![1, 1, 2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
