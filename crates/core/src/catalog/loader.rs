use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    error::CatalogLoadError,
    manifest::parse_manifest,
    resource::{ResourceLayout, ResourceSource},
};

use super::index::CardIndex;

/// Lifecycle of the catalog.
#[derive(Debug, Clone)]
pub enum CatalogStatus {
    /// Nothing requested yet.
    Empty,
    /// A manifest fetch is outstanding.
    Loading,
    /// The catalog is fully loaded.
    Ready(Arc<CardIndex>),
    /// The last load failed; call [`CardCatalog::clear_error`] to retry.
    Failed(CatalogLoadError),
}

/// Result of a [`CardCatalog::load`] call that did not fail.
#[derive(Debug, Clone)]
pub enum CatalogLoad {
    /// The catalog is available.
    Ready(Arc<CardIndex>),
    /// Another caller is loading; await that caller instead.
    InFlight,
}

/// Shared handle to the card catalog. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug)]
struct Inner {
    layout: ResourceLayout,
    status: CatalogStatus,
}

impl CardCatalog {
    /// Create an empty catalog reading its manifest through `layout`.
    pub fn new(layout: ResourceLayout) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                layout,
                status: CatalogStatus::Empty,
            })),
        }
    }

    /// Catalog that is already loaded with `index`.
    pub fn with_index(layout: ResourceLayout, index: CardIndex) -> Self {
        let catalog = Self::new(layout);
        catalog.inner.write().status = CatalogStatus::Ready(Arc::new(index));
        catalog
    }

    /// Current lifecycle state.
    pub fn status(&self) -> CatalogStatus {
        self.inner.read().status.clone()
    }

    /// Layout used to locate manifest and images.
    pub fn layout(&self) -> ResourceLayout {
        self.inner.read().layout.clone()
    }

    /// The loaded catalog, if any. Never exposes a partial catalog.
    pub fn snapshot(&self) -> Option<Arc<CardIndex>> {
        match &self.inner.read().status {
            CatalogStatus::Ready(index) => Some(Arc::clone(index)),
            _ => None,
        }
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self.inner.read().status, CatalogStatus::Loading)
    }

    /// Reset a failed catalog to empty so that [`CardCatalog::load`] fetches again.
    pub fn clear_error(&self) {
        let mut inner = self.inner.write();
        if matches!(inner.status, CatalogStatus::Failed(_)) {
            inner.status = CatalogStatus::Empty;
        }
    }

    /// Fetch and parse the manifest once.
    ///
    /// Loaded catalogs are returned without fetching, a failed catalog
    /// returns its stored error, and a concurrent caller gets
    /// [`CatalogLoad::InFlight`] rather than starting a second fetch.
    pub async fn load<S: ResourceSource>(&self, source: &S) -> Result<CatalogLoad, CatalogLoadError> {
        let manifest_path = {
            let mut inner = self.inner.write();
            match &inner.status {
                CatalogStatus::Ready(index) => return Ok(CatalogLoad::Ready(Arc::clone(index))),
                CatalogStatus::Loading => return Ok(CatalogLoad::InFlight),
                CatalogStatus::Failed(err) => return Err(err.clone()),
                CatalogStatus::Empty => {}
            }
            inner.status = CatalogStatus::Loading;
            inner.layout.manifest_path()
        };

        let result = match source.fetch(&manifest_path).await {
            Ok(bytes) => parse_manifest(&manifest_path, &bytes),
            Err(err) => Err(CatalogLoadError::from(err)),
        };

        let mut inner = self.inner.write();
        match result {
            Ok(cards) => {
                let index = Arc::new(CardIndex::new(cards));
                info!(
                    cards = index.len(),
                    classes = index.classes().len(),
                    "card catalog loaded"
                );
                inner.status = CatalogStatus::Ready(Arc::clone(&index));
                Ok(CatalogLoad::Ready(index))
            }
            Err(err) => {
                warn!(%err, "card catalog failed to load");
                inner.status = CatalogStatus::Failed(err.clone());
                Err(err)
            }
        }
    }
}
