//! Scenecheck scenario harness
//!
//! Drives a headless browser through declarative scenarios against web
//! clients that render onto a canvas:
//! - Scenarios are loaded from YAML or built in code (see [`catalog`])
//! - Readiness is detected by polling structural conditions, not by sleeping
//! - Input is dispatched as raw pointer events at viewport coordinates
//! - Screenshots land in a deterministic per-run directory, with a failure
//!   screenshot whenever a step fails
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(scenario) -> RunReport                                 │
//! │    ├── SessionFactory::launch(viewport) -> BrowserSession   │
//! │    ├── navigate        -> TargetProbe + session.navigate    │
//! │    ├── wait_for_ready  -> ReadinessWaiter                   │
//! │    ├── interact        -> CoordinateInteractor              │
//! │    ├── capture         -> EvidenceCapturer                  │
//! │    └── assert_visible  -> ReadinessWaiter                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserSession                                             │
//! │    ├── PlaywrightSession (node driver, JSON lines on stdio) │
//! │    └── ScriptedSession   (in-memory, dry runs and tests)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod evidence;
pub mod interact;
pub mod locator;
pub mod playwright;
pub mod probe;
pub mod readiness;
pub mod runner;
pub mod scenario;
pub mod scripted;
pub mod session;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use evidence::{EvidenceCapturer, EvidenceEntry};
pub use interact::{CoordinateInteractor, Interaction};
pub use locator::{Locator, Point, Region, Viewport};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightLauncher};
pub use readiness::{Readiness, ReadinessWaiter};
pub use runner::{FailureKind, FailureReason, RunReport, ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenario::{InteractionAction, ReadinessCondition, Scenario, ScenarioStep, SearchPolicy};
pub use session::{BrowserSession, ConsoleLevel, ConsoleMessage, PointerEvent, SessionFactory};
