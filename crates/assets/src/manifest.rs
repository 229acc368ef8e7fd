//! Manifest existence checks
//!
//! The manifest is a JSON object whose `sheets` field maps relative asset
//! paths to opaque per-sheet configuration. Only existence of each path is
//! checked; sheet configuration is never interpreted.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ManifestError, Result};

/// Manifest location relative to the client project root
pub const DEFAULT_MANIFEST: &str = "public/assets/spritesheet_config.json";

/// Directory the manifest keys are relative to
pub const DEFAULT_ASSETS_ROOT: &str = "public/assets";

/// Entry echoed when no spotlight is requested explicitly
pub const DEFAULT_SPOTLIGHT: &str = "Characters/Workers/CyanWorker/FarmerCyan.png";

/// The one manifest entry picked out for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Spotlight {
    NotRequested,
    /// The key is in the manifest; its configuration is echoed whether or
    /// not the file exists
    Present {
        key: String,
        config: Value,
        pretty: String,
    },
    /// The key is not in the manifest at all
    Absent { key: String },
}

/// Result of checking a manifest against the filesystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub manifest: PathBuf,
    pub assets_root: PathBuf,
    pub total_entries: usize,
    /// Keys whose file does not exist, in manifest order
    pub missing: Vec<String>,
    pub spotlight: Spotlight,
}

impl ValidationReport {
    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Deserialize)]
struct SpriteManifest {
    sheets: Map<String, Value>,
}

/// Checks a sprite-sheet manifest against an assets directory
pub struct ManifestValidator {
    manifest: PathBuf,
    assets_root: PathBuf,
}

impl ManifestValidator {
    pub fn new(manifest: impl Into<PathBuf>, assets_root: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            assets_root: assets_root.into(),
        }
    }

    /// Validator for a client checkout using the conventional layout
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(
            project_root.join(DEFAULT_MANIFEST),
            project_root.join(DEFAULT_ASSETS_ROOT),
        )
    }

    /// Check every manifest key and echo `spotlight` if given.
    ///
    /// A missing or unparseable manifest is an error, never an empty report.
    pub fn validate(&self, spotlight: Option<&str>) -> Result<ValidationReport> {
        let sheets = self.load()?;
        info!("Checking {} manifest entries under {}", sheets.len(), self.assets_root.display());

        let mut missing = Vec::new();
        for key in sheets.keys() {
            let relative = safe_relative(key)?;
            let path = self.assets_root.join(relative);
            if path.is_file() {
                debug!("Found {}", key);
            } else {
                warn!("Missing asset: {}", key);
                missing.push(key.clone());
            }
        }

        let spotlight = match spotlight {
            None => Spotlight::NotRequested,
            Some(key) => match sheets.get(key) {
                Some(config) => Spotlight::Present {
                    key: key.to_string(),
                    pretty: serde_json::to_string_pretty(config).map_err(|e| {
                        ManifestError::Malformed {
                            path: self.manifest.clone(),
                            reason: format!("cannot render '{}': {}", key, e),
                        }
                    })?,
                    config: config.clone(),
                },
                None => Spotlight::Absent { key: key.to_string() },
            },
        };

        Ok(ValidationReport {
            manifest: self.manifest.clone(),
            assets_root: self.assets_root.clone(),
            total_entries: sheets.len(),
            missing,
            spotlight,
        })
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.manifest.exists() {
            return Err(ManifestError::NotFound(self.manifest.clone()));
        }
        let content = std::fs::read_to_string(&self.manifest).map_err(|source| ManifestError::Io {
            path: self.manifest.clone(),
            source,
        })?;
        let parsed: SpriteManifest =
            serde_json::from_str(&content).map_err(|e| ManifestError::Malformed {
                path: self.manifest.clone(),
                reason: e.to_string(),
            })?;
        Ok(parsed.sheets)
    }
}

/// Reject keys that would resolve outside the assets root
fn safe_relative(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || key.is_empty() {
        return Err(ManifestError::PathTraversal(key.to_string()));
    }
    Ok(path)
}
