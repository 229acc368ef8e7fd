//! Error types for the scene harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Navigation failed: {0}")]
    NavigationFailure(String),

    #[error("Timeout waiting for: {0}")]
    ReadinessTimeout(String),

    #[error("Target unresolvable: {0}")]
    TargetUnresolvable(String),

    #[error("Could not write evidence {path}: {reason}")]
    CaptureIo { path: String, reason: String },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
