//! Screenshot evidence for human review
//!
//! Every artifact of a run lands in `<output_root>/<scenario>/<run_id>/`
//! as `<label>.png`. Paths are derived, never chosen ad hoc, and a run
//! refuses to write the same path twice.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use crate::session::BrowserSession;

/// Label reserved for the screenshot taken when a step fails
pub const FAILURE_LABEL: &str = "failure";

/// File name for a capture label: anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn artifact_file_name(label: &str) -> String {
    format!("{}.png", sanitize(label))
}

pub(crate) fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// One written artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub label: String,
    pub path: PathBuf,
    /// SHA256 of the file as written
    pub sha256: String,
    /// Whether this is the failure screenshot
    pub failure: bool,
}

/// Writes screenshots for one run
pub struct EvidenceCapturer {
    run_dir: PathBuf,
    entries: Vec<EvidenceEntry>,
}

impl EvidenceCapturer {
    pub fn new(output_root: &Path, scenario: &str, run_id: &str) -> Self {
        Self {
            run_dir: output_root.join(sanitize(scenario)).join(sanitize(run_id)),
            entries: Vec::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Where `label` would be written
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.run_dir.join(artifact_file_name(label))
    }

    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    /// Screenshot the current page under `label`
    pub async fn capture(
        &mut self,
        session: &mut dyn BrowserSession,
        label: &str,
    ) -> HarnessResult<PathBuf> {
        if artifact_file_name(label) == artifact_file_name(FAILURE_LABEL) {
            return Err(HarnessError::InvalidScenario(format!(
                "capture label '{}' is reserved for failure evidence",
                FAILURE_LABEL
            )));
        }
        self.write(session, label, false).await
    }

    /// Screenshot the page as it was when a step failed
    pub async fn capture_failure(&mut self, session: &mut dyn BrowserSession) -> HarnessResult<PathBuf> {
        self.write(session, FAILURE_LABEL, true).await
    }

    async fn write(
        &mut self,
        session: &mut dyn BrowserSession,
        label: &str,
        failure: bool,
    ) -> HarnessResult<PathBuf> {
        let path = self.path_for(label);
        if let Some(existing) = self.entries.iter().find(|e| e.path == path) {
            return Err(HarnessError::InvalidScenario(format!(
                "evidence '{}' would overwrite '{}' at {}",
                label,
                existing.label,
                path.display()
            )));
        }

        std::fs::create_dir_all(&self.run_dir).map_err(|e| capture_io(&self.run_dir, e))?;

        session
            .screenshot(&path)
            .await
            .map_err(|e| capture_io(&path, e))?;

        let sha256 = hash_file(&path).map_err(|e| capture_io(&path, e))?;
        debug!("Wrote {} ({})", path.display(), &sha256[..12]);
        if failure {
            info!("Failure evidence saved to {}", path.display());
        } else {
            info!("Captured '{}' -> {}", label, path.display());
        }

        self.entries.push(EvidenceEntry {
            label: label.to_string(),
            path: path.clone(),
            sha256,
            failure,
        });
        Ok(path)
    }

    /// Write a JSON document next to the screenshots
    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.run_dir).map_err(|e| capture_io(&self.run_dir, e))?;
        let path = self.run_dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json).map_err(|e| capture_io(&path, e))?;
        Ok(path)
    }
}

fn capture_io(path: &Path, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::CaptureIo {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Hash a file using SHA256
fn hash_file(path: &Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
