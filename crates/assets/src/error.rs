//! Manifest loading errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort manifest validation
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Malformed manifest {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Manifest key escapes the assets root: {0}")]
    PathTraversal(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;
