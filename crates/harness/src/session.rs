//! The browser session seam
//!
//! The runner never talks to a browser directly. It drives a
//! [`BrowserSession`] obtained from a [`SessionFactory`], which lets the
//! Playwright driver and the in-memory scripted session share one contract.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;
use crate::locator::{Point, Region, Viewport};

/// One raw pointer event as dispatched to the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Move { at: Point },
    /// Move to `at`, then press the primary button
    Down { at: Point },
    /// Move to `at`, then release the primary button
    Up { at: Point },
    /// Press and release at `at` without intermediate movement
    Click { at: Point },
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::Move { at }
            | PointerEvent::Down { at }
            | PointerEvent::Up { at }
            | PointerEvent::Click { at } => at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warning,
    Error,
    /// Uncaught exception reported by the page
    PageError,
}

/// A message the application under test wrote to its console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.level, self.text)
    }
}

/// A live page in a browser, owned by exactly one scenario run
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` and wait for the document to commit.
    ///
    /// Fails with `HarnessError::NavigationFailure` when the page cannot be
    /// loaded within `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarnessResult<()>;

    /// Bounding box of the first visible element matching a CSS selector
    async fn find_selector(&mut self, selector: &str) -> HarnessResult<Option<Region>>;

    /// Bounding box of the first visible element containing `text`
    async fn find_text(&mut self, text: &str) -> HarnessResult<Option<Region>>;

    /// Size the page reports for its layout viewport
    async fn viewport(&mut self) -> HarnessResult<Viewport>;

    async fn pointer(&mut self, event: PointerEvent) -> HarnessResult<()>;

    /// Write a PNG of the visible viewport to `path`
    async fn screenshot(&mut self, path: &Path) -> HarnessResult<()>;

    /// Console messages observed since the last drain
    fn drain_console(&mut self) -> Vec<ConsoleMessage>;

    /// Release the browser. Called exactly once per session by the runner.
    async fn close(&mut self) -> HarnessResult<()>;
}

/// Creates fresh sessions, one per scenario run
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn launch(&self, viewport: Viewport) -> HarnessResult<Box<dyn BrowserSession>>;
}
