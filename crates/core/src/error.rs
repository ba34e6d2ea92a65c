//! Error taxonomy shared by the catalog, save codec and exporters.

use std::path::PathBuf;

use thiserror::Error;

/// Failure loading the card manifest. Terminal until the load is retried.
#[derive(Debug, Clone, Error)]
pub enum CatalogLoadError {
    /// The manifest could not be retrieved.
    #[error("failed to fetch card manifest: {0}")]
    Fetch(#[from] ResourceFetchError),
    /// The manifest was retrieved but is not a card array.
    #[error("failed to parse card manifest {path}: {message}")]
    Parse {
        /// Manifest path relative to the resource base.
        path: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// A save document failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed save document: {reason}")]
pub struct MalformedSaveError {
    /// Human readable cause.
    pub reason: String,
}

impl MalformedSaveError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A resource could not be retrieved from the resource source.
#[derive(Debug, Clone, Error)]
pub enum ResourceFetchError {
    /// The source answered with a non-success HTTP status.
    #[error("{path}: server responded with {status}")]
    Status {
        /// Requested path.
        path: String,
        /// HTTP status code.
        status: u16,
    },
    /// The request failed before a response arrived.
    #[error("{path}: {message}")]
    Transport {
        /// Requested path.
        path: String,
        /// Transport diagnostic.
        message: String,
    },
    /// The resource does not exist in a local source.
    #[error("{path}: not found")]
    NotFound {
        /// Requested path.
        path: String,
    },
}

impl ResourceFetchError {
    /// Path of the resource that failed.
    pub fn path(&self) -> &str {
        match self {
            ResourceFetchError::Status { path, .. }
            | ResourceFetchError::Transport { path, .. }
            | ResourceFetchError::NotFound { path } => path,
        }
    }
}

/// Failure of one archive export attempt. The selection is never touched.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A card image could not be fetched.
    #[error(transparent)]
    Fetch(#[from] ResourceFetchError),
    /// The zip writer failed.
    #[error("failed to assemble archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Serializing the save document or writing the output failed.
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    /// The save document could not be encoded.
    #[error("failed to encode save document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The operating system refused to open the print preview.
#[derive(Debug, Error)]
#[error("unable to open print preview {path}: {message}")]
pub struct UnavailablePopupError {
    /// Preview document that could not be shown.
    pub path: PathBuf,
    /// Launcher diagnostic.
    pub message: String,
}
