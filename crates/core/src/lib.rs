#![warn(clippy::all, missing_docs)]

//! Core logic of the Daggerheart character builder.
//!
//! This crate hosts the card catalog, the class and domain reference
//! tables, the selection state machine, the save codec and the exporters
//! used by the terminal UI and any future frontends.

pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod manifest;
pub mod models;
pub mod resource;
pub mod rules;
pub mod save;
pub mod selection;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{CardCatalog, CardIndex, CatalogLoad, CatalogStatus, ClassInfo};
pub use config::AppConfig;
pub use error::{
    CatalogLoadError, ExportError, MalformedSaveError, ResourceFetchError, UnavailablePopupError,
};
pub use models::{Card, Category, Domain, Subcategory};
pub use rules::{DomainMode, RuleSet};
pub use save::{CharacterSave, SaveEntry, SaveManager};
pub use selection::{SelectionState, SelectionStore};
