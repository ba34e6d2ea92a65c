//! Access to the static card resources (manifest and images).

/// Resource sources: HTTP server or local directory.
pub mod source;

pub use source::{DirSource, HttpSource, ResourceClient, ResourceLayout, ResourceSource};
