//! Construction-time error taxonomy.
//!
//! Every failure in this crate is static: it is decided by channel counts,
//! strides and operation keys, never by tensor values. Once an operation has
//! been constructed, applying it cannot fail on shape grounds.

use thiserror::Error;

/// Errors raised while resolving or constructing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// A kind-specific channel invariant was violated (odd `c_out` for a
    /// factorized reduction, `c_in != c_out` for identity, ...).
    #[error("invalid channel configuration for `{op}`: {reason}")]
    InvalidChannelConfig {
        /// Operation kind being constructed.
        op: &'static str,
        /// Human readable description of the violated rule.
        reason: String,
    },

    /// The stride is not positive or the kind cannot honour it.
    #[error("invalid stride {stride} for `{op}`: {reason}")]
    InvalidStride {
        /// Operation kind being constructed.
        op: &'static str,
        /// Requested stride.
        stride: usize,
        /// Why the stride was rejected.
        reason: &'static str,
    },

    /// Kernel, padding or dilation cannot preserve the spatial contract.
    #[error("invalid geometry for `{op}`: {reason}")]
    InvalidGeometry {
        /// Operation kind being constructed.
        op: &'static str,
        /// Which geometry rule was violated.
        reason: String,
    },

    /// A genotype referenced a key absent from the selected catalog.
    #[error("unknown operation `{key}` in catalog `{catalog}`")]
    UnknownOperation {
        /// Catalog that was searched.
        catalog: &'static str,
        /// Offending key.
        key: String,
    },

    /// A network already built from one catalog requested another.
    #[error("catalog mismatch: network is bound to `{bound}`, requested `{requested}`")]
    CatalogMismatch {
        /// Catalog the network was first assembled from.
        bound: &'static str,
        /// Catalog named by the rejected request.
        requested: &'static str,
    },

    /// The configured catalog name is not recognised.
    #[error("unknown catalog `{0}`")]
    UnknownCatalog(String),

    /// Parallel edges disagree on the shape they feed into a node.
    #[error("shape mismatch in {context}: {shapes:?}")]
    ShapeMismatch {
        /// Which combination was attempted (`sum`, `concat`).
        context: &'static str,
        /// The offending shapes as `[n, c, h, w]`.
        shapes: Vec<[usize; 4]>,
    },

    /// Flat data does not match the declared tensor shape.
    #[error("tensor data of length {len} does not fit shape {shape:?}")]
    MalformedTensor {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of elements supplied.
        len: usize,
    },
}

/// Shorthand used throughout the crate.
pub type Result<T> = core::result::Result<T, OpError>;
