//! Harness configuration
//!
//! Everything that used to be hard-coded per script (port, viewport,
//! output directory, timeouts) lives here and is passed explicitly into the
//! runner.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;
use crate::locator::Viewport;
use crate::playwright::Browser;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Where the game client is served; relative navigation targets join onto it
    pub target_url: String,

    /// Viewport used when a scenario does not declare one
    pub viewport: Viewport,

    /// Root directory for run artifacts
    pub output_root: PathBuf,

    pub browser: Browser,

    pub headless: bool,

    /// Budget for waits and lookups that declare no timeout
    pub default_timeout_ms: u64,

    /// Delay between readiness checks
    pub poll_interval_ms: u64,

    pub navigation_timeout_ms: u64,

    /// Probe the target over HTTP before handing navigation to the browser
    pub probe_target: bool,

    /// Fixed run identity; derived from the clock when absent
    pub run_id: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:5173".to_string(),
            viewport: Viewport::default(),
            output_root: PathBuf::from("verification"),
            browser: Browser::Chromium,
            headless: true,
            default_timeout_ms: 10_000,
            poll_interval_ms: 100,
            navigation_timeout_ms: 30_000,
            probe_target: true,
            run_id: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// A fresh run identity: UTC timestamp plus a short random suffix
pub fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8])
}
