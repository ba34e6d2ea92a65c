//! Card catalog: one-shot manifest load plus derived query views.

/// Immutable card index and class derivation.
pub mod index;
/// Guarded, idempotent manifest loading.
pub mod loader;

pub use index::{derive_classes, CardIndex, ClassInfo};
pub use loader::{CardCatalog, CatalogLoad, CatalogStatus};
