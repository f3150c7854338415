//! cellops: operation primitives for neural-architecture-search cells.
//!
//! A search cell wires a handful of candidate operations along its edges and
//! sums or concatenates their outputs. That only works if every candidate
//! honours the same contract: built from `(c_in, c_out, stride, affine)`, it
//! maps `(N, c_in, H, W)` to `(N, c_out, H/stride, W/stride)`. This crate
//! provides those candidates, the catalogs that name them, and the shape
//! algebra that checks the contract before anything runs.
//!
//! # Modules
//!
//! - [`tensors`]: `(N, C, H, W)` tensors and learnable parameters.
//! - [`ops`]: forward CPU kernels (convolution, batch norm, pooling, ...).
//! - [`layers`]: parameter-owning convolution and batch-norm layers.
//! - [`primitives`]: the [`Operation`](primitives::Operation) contract and every block.
//! - [`registry`]: catalogs resolving genotype keys into constructors.
//! - [`assembly`]: catalog binding for one network.
//! - [`config`]: process-wide catalog selection.
//! - [`shape`]: shape arithmetic and precondition checks.
//! - [`error`]: the construction-time error taxonomy.
//!
//! # Example
//!
//! ```rust
//! use cellops::primitives::Operation;
//! use cellops::registry::{lookup, Catalog};
//! use cellops::tensors::Tensor;
//!
//! let reduce = lookup(Catalog::Primary, "skip_connect")?.build(16, 32, 2, true)?;
//! let x = Tensor::full(vec![2, 16, 8, 8], 1.0);
//! assert_eq!(reduce.forward(&x).shape, vec![2, 32, 4, 4]);
//! # Ok::<(), cellops::error::OpError>(())
//! ```

pub mod assembly;
pub mod config;
pub mod error;
pub mod layers;
pub mod ops;
pub mod primitives;
pub mod registry;
pub mod shape;
pub mod tensors;

pub use crate::error::{OpError, Result};
pub use crate::primitives::{Op, Operation};
pub use crate::registry::{Catalog, Constructor, Primitive, lookup};
