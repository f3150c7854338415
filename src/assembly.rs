//! The call contract between a cell assembler and the registry.
//!
//! A network is built from exactly one catalog. [`Assembly`] tracks which
//! catalog the first operation came from and refuses requests naming another
//! one, so a configuration change halfway through assembly fails fast instead
//! of producing a network that mixes two search spaces.

use crate::config;
use crate::error::{OpError, Result};
use crate::primitives::{Op, Operation};
use crate::registry::Catalog;

/// Construction bookkeeping for one network.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    bound: Option<Catalog>,
    built: usize,
    params: usize,
}

impl Assembly {
    /// An assembly that binds to the catalog of its first construction.
    pub fn new() -> Self {
        Self::default()
    }

    /// An assembly pinned to `catalog` up front.
    pub fn bound_to(catalog: Catalog) -> Self {
        Self { bound: Some(catalog), ..Self::default() }
    }

    /// Catalog this network is bound to, if any.
    pub fn catalog(&self) -> Option<Catalog> {
        self.bound
    }

    /// Number of operations constructed so far.
    pub fn built(&self) -> usize {
        self.built
    }

    /// Learnable scalars across every constructed operation.
    pub fn param_count(&self) -> usize {
        self.params
    }

    /// Learnable scalars in millions, the "param size" NAS results are reported in.
    pub fn param_count_millions(&self) -> f64 {
        self.params as f64 / 1e6
    }

    /// Resolves `key` in `catalog` and constructs it.
    ///
    /// # Errors
    /// - [`OpError::CatalogMismatch`] if the network is bound to another catalog
    /// - [`OpError::UnknownOperation`] if `key` is not in `catalog`
    /// - any construction error of the resolved block
    pub fn build(
        &mut self,
        catalog: Catalog,
        key: &str,
        c_in: usize,
        c_out: usize,
        stride: usize,
        affine: bool,
    ) -> Result<Op> {
        if let Some(bound) = self.bound.filter(|b| *b != catalog) {
            tracing::warn!(bound = bound.name(), requested = catalog.name(), key, "catalog mismatch");
            return Err(OpError::CatalogMismatch { bound: bound.name(), requested: catalog.name() });
        }

        let op = catalog.lookup(key)?.build(c_in, c_out, stride, affine)?;
        self.bound = Some(catalog);
        self.built += 1;
        self.params += op.param_count();
        Ok(op)
    }

    /// [`Assembly::build`] against the process-wide catalog.
    ///
    /// # Errors
    /// See [`Assembly::build`].
    pub fn build_default(&mut self, key: &str, c_in: usize, c_out: usize, stride: usize, affine: bool) -> Result<Op> {
        self.build(config::get_catalog(), key, c_in, c_out, stride, affine)
    }
}
