//! Run configuration.
//!
//! The catalog is chosen once per run and stored globally in an `AtomicU8`.
//!
//! The per-edge `affine` flag travels with each construction request; the
//! capacity knob is part of the operation key itself.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::Result;
use crate::registry::Catalog;

/// Process-wide catalog. Written at startup, read afterwards.
static GLOBAL_CATALOG: AtomicU8 = AtomicU8::new(Catalog::Primary as u8);

/// Selects the catalog used by [`Assembly::build_default`](crate::assembly::Assembly::build_default).
///
/// # Example
///
/// ```
/// use cellops::config::{get_catalog, set_catalog};
/// use cellops::registry::Catalog;
/// set_catalog(Catalog::Legacy);
/// assert_eq!(get_catalog(), Catalog::Legacy);
/// # set_catalog(Catalog::Primary);
/// ```
pub fn set_catalog(catalog: Catalog) {
    tracing::info!(catalog = catalog.name(), "selected operation catalog");
    GLOBAL_CATALOG.store(catalog as u8, Ordering::Release);
}

/// Returns the process-wide catalog, [`Catalog::Primary`] unless changed.
pub fn get_catalog() -> Catalog {
    Catalog::try_from(GLOBAL_CATALOG.load(Ordering::Acquire)).unwrap_or_default()
}

/// Settings the operation library consumes from the training harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpsConfig {
    pub catalog: Catalog,
    /// Whether batch-norm stages own a learnable scale and shift.
    pub affine: bool,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self { catalog: Catalog::Primary, affine: true }
    }
}

impl OpsConfig {
    /// Parses a catalog name as the harness spells it (`primary`, `OPS`,
    /// `legacy`, `DARTS_OPS`).
    ///
    /// # Errors
    /// [`OpError::UnknownCatalog`](crate::error::OpError::UnknownCatalog) for any other name.
    pub fn from_names(catalog: &str, affine: bool) -> Result<Self> {
        Ok(Self { catalog: catalog.parse()?, affine })
    }

    /// Installs the catalog process-wide.
    pub fn apply(&self) {
        set_catalog(self.catalog);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpError;

    #[test]
    fn test_from_names_accepts_aliases() {
        assert_eq!(OpsConfig::from_names("OPS", true).unwrap().catalog, Catalog::Primary);
        assert_eq!(OpsConfig::from_names("darts_ops", false).unwrap().catalog, Catalog::Legacy);
        assert_eq!(OpsConfig::from_names("Legacy", false).unwrap().catalog, Catalog::Legacy);
    }

    #[test]
    fn test_from_names_rejects_unknown() {
        assert_eq!(
            OpsConfig::from_names("nasnet", true),
            Err(OpError::UnknownCatalog("nasnet".to_owned()))
        );
    }

    #[test]
    fn test_default_config() {
        let cfg = OpsConfig::default();
        assert_eq!(cfg.catalog, Catalog::Primary);
        assert!(cfg.affine);
    }
}
