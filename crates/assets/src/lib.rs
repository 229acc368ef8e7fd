//! Sprite-sheet manifest checks
//!
//! Loads the JSON manifest that maps asset paths to sheet configuration,
//! confirms every referenced file exists under the assets root, and echoes
//! one entry for spot inspection. Runs against the filesystem only; no
//! browser is involved.

pub mod error;
pub mod manifest;

pub use error::{ManifestError, Result};
pub use manifest::{ManifestValidator, Spotlight, ValidationReport};
