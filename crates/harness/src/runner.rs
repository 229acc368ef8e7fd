//! Scenario runner: one browser session, steps in order, evidence on failure

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{new_run_id, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::evidence::{sanitize, EvidenceCapturer, EvidenceEntry};
use crate::interact::{CoordinateInteractor, Interaction};
use crate::locator::{Locator, Viewport};
use crate::probe::TargetProbe;
use crate::readiness::{Readiness, ReadinessWaiter};
use crate::scenario::{ReadinessCondition, Scenario, ScenarioStep};
use crate::session::{BrowserSession, ConsoleLevel, ConsoleMessage, SessionFactory};

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NavigationFailure,
    ReadinessTimeout,
    TargetUnresolvable,
    CaptureIoError,
    /// The scenario asked for something contradictory, e.g. two artifacts
    /// at one path
    Configuration,
    /// The automation layer itself broke (driver crash, protocol error)
    SessionFault,
}

impl FailureKind {
    fn classify(err: &HarnessError) -> Self {
        match err {
            HarnessError::NavigationFailure(_) => FailureKind::NavigationFailure,
            HarnessError::ReadinessTimeout(_) => FailureKind::ReadinessTimeout,
            HarnessError::TargetUnresolvable(_) => FailureKind::TargetUnresolvable,
            HarnessError::CaptureIo { .. } => FailureKind::CaptureIoError,
            HarnessError::InvalidScenario(_) => FailureKind::Configuration,
            _ => FailureKind::SessionFault,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NavigationFailure => "navigation failure",
            FailureKind::ReadinessTimeout => "readiness timeout",
            FailureKind::TargetUnresolvable => "target unresolvable",
            FailureKind::CaptureIoError => "capture I/O error",
            FailureKind::Configuration => "configuration error",
            FailureKind::SessionFault => "session fault",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of a scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioResult {
    /// Paths of every captured screenshot, in capture order
    Success { evidence: Vec<PathBuf> },
    Failure {
        failed_step_index: usize,
        reason: FailureReason,
        /// Screenshot of the page at the moment of failure, when one
        /// could be taken
        evidence: Option<PathBuf>,
    },
}

impl ScenarioResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScenarioResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    /// A best-effort wait ran out of time and the run carried on
    TimedOutBestEffort,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything known about one run, written as `report.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub scenario: String,
    pub target_url: String,
    pub viewport: Viewport,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub result: ScenarioResult,
    pub steps: Vec<StepRecord>,
    pub evidence: Vec<EvidenceEntry>,
    /// Messages the application printed during the run
    pub console: Vec<ConsoleMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

/// A scenario that never got a session, e.g. because it failed validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortedRun {
    pub scenario: String,
    pub error: String,
}

/// Result of running several scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub reports: Vec<RunReport>,
    pub aborted: Vec<AbortedRun>,
}

/// Mutable state of one run, separate from the session so the session can
/// still be closed after a fault
struct RunState {
    viewport: Viewport,
    waiter: ReadinessWaiter,
    interactor: CoordinateInteractor,
    capturer: EvidenceCapturer,
    steps: Vec<StepRecord>,
    console: Vec<ConsoleMessage>,
    probe: Option<TargetProbe>,
}

impl RunState {
    fn relay_console(&mut self, session: &mut dyn BrowserSession) {
        for message in session.drain_console() {
            match message.level {
                ConsoleLevel::Error | ConsoleLevel::PageError => {
                    warn!(target: "console", "{}", message)
                }
                _ => info!(target: "console", "{}", message),
            }
            self.console.push(message);
        }
    }
}

/// What a successful step leaves behind
#[derive(Default)]
struct StepEffect {
    status: Option<StepStatus>,
    detail: Option<String>,
}

/// Executes scenarios against sessions from a [`SessionFactory`]
pub struct ScenarioRunner {
    config: HarnessConfig,
    factory: Arc<dyn SessionFactory>,
}

impl ScenarioRunner {
    pub fn new(config: HarnessConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario.
    ///
    /// Step failures come back as `ScenarioResult::Failure` inside the
    /// report. `Err` means the run never started: the scenario is invalid
    /// or no browser could be launched.
    pub async fn run(&self, scenario: &Scenario) -> HarnessResult<RunReport> {
        scenario.validate()?;

        let viewport = scenario.viewport.unwrap_or(self.config.viewport);
        let run_id = self.config.run_id.clone().unwrap_or_else(new_run_id);
        let started_at = Utc::now();
        let clock = Instant::now();

        info!("Running '{}' (run {}) at {}", scenario.name, run_id, viewport);

        let waiter = ReadinessWaiter::new(self.config.poll_interval(), scenario.surface.clone());
        let mut state = RunState {
            viewport,
            interactor: CoordinateInteractor::new(viewport, waiter.clone(), self.config.default_timeout()),
            waiter,
            capturer: EvidenceCapturer::new(&self.config.output_root, &scenario.name, &run_id),
            steps: Vec::with_capacity(scenario.steps.len()),
            console: Vec::new(),
            probe: None,
        };

        let mut session = self.factory.launch(viewport).await?;

        let executed = AssertUnwindSafe(self.execute(scenario, session.as_mut(), &mut state))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!("Failed to release browser session: {}", e);
        }
        // Closing can flush events that were still in flight
        state.relay_console(session.as_mut());
        debug!("Session released for run {}", run_id);

        let result = match executed {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        match &result {
            ScenarioResult::Success { evidence } => {
                info!("✓ {} ({} artifact(s))", scenario.name, evidence.len())
            }
            ScenarioResult::Failure { failed_step_index, reason, .. } => {
                error!("✗ {} - step {}: {}", scenario.name, failed_step_index, reason)
            }
        }

        let mut report = RunReport {
            run_id,
            scenario: scenario.name.clone(),
            target_url: self.config.target_url.clone(),
            viewport,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            result,
            steps: state.steps,
            evidence: state.capturer.entries().to_vec(),
            console: state.console,
            report_path: None,
        };

        match state.capturer.write_json("report.json", &report) {
            Ok(path) => {
                info!("Report written to: {}", path.display());
                report.report_path = Some(path);
            }
            Err(e) => warn!("Could not write run report: {}", e),
        }

        Ok(report)
    }

    /// Run scenarios one after another
    pub async fn run_all(&self, scenarios: &[Scenario]) -> HarnessResult<SuiteResult> {
        self.run_concurrent(scenarios, 1).await
    }

    /// Run up to `limit` scenarios at a time, each with its own session and
    /// output directory. Reports keep the input order.
    pub async fn run_concurrent(&self, scenarios: &[Scenario], limit: usize) -> HarnessResult<SuiteResult> {
        let mut seen = std::collections::HashMap::new();
        for scenario in scenarios {
            let dir = sanitize(&scenario.name);
            if let Some(previous) = seen.insert(dir.clone(), scenario.name.as_str()) {
                return Err(HarnessError::InvalidScenario(format!(
                    "scenarios '{}' and '{}' would share the output directory '{}'",
                    previous, scenario.name, dir
                )));
            }
        }

        let start = Instant::now();
        info!("Running {} scenario(s)...", scenarios.len());

        let outcomes: Vec<(String, HarnessResult<RunReport>)> = futures::stream::iter(scenarios)
            .map(|scenario| async move { (scenario.name.clone(), self.run(scenario).await) })
            .buffered(limit.max(1))
            .collect()
            .await;

        let mut reports = Vec::new();
        let mut aborted = Vec::new();
        for (scenario, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("✗ {} - {}", scenario, e);
                    aborted.push(AbortedRun { scenario, error: e.to_string() });
                }
            }
        }

        let passed = reports.iter().filter(|r| r.result.is_success()).count();
        let failed = scenarios.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Scenario results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            reports,
            aborted,
        })
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        session: &mut dyn BrowserSession,
        state: &mut RunState,
    ) -> ScenarioResult {
        for (index, step) in scenario.steps.iter().enumerate() {
            let name = step.describe();
            let started = Instant::now();
            debug!("Step {}: {}", index, name);

            let outcome = self.execute_step(step, session, state).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            state.relay_console(session);

            match outcome {
                Ok(effect) => state.steps.push(StepRecord {
                    index,
                    step: name,
                    status: effect.status.unwrap_or(StepStatus::Passed),
                    duration_ms,
                    detail: effect.detail,
                }),
                Err(err) => {
                    let reason = FailureReason {
                        kind: FailureKind::classify(&err),
                        message: format!("step {} ({}) failed: {}", index, name, err),
                    };
                    warn!("{}", reason);

                    let evidence = match state.capturer.capture_failure(session).await {
                        Ok(path) => Some(path),
                        Err(e) => {
                            warn!("Could not capture failure evidence: {}", e);
                            None
                        }
                    };

                    state.steps.push(StepRecord {
                        index,
                        step: name,
                        status: StepStatus::Failed,
                        duration_ms,
                        detail: Some(reason.message.clone()),
                    });
                    return ScenarioResult::Failure {
                        failed_step_index: index,
                        reason,
                        evidence,
                    };
                }
            }
        }

        ScenarioResult::Success {
            evidence: state
                .capturer
                .entries()
                .iter()
                .filter(|e| !e.failure)
                .map(|e| e.path.clone())
                .collect(),
        }
    }

    async fn execute_step(
        &self,
        step: &ScenarioStep,
        session: &mut dyn BrowserSession,
        state: &mut RunState,
    ) -> HarnessResult<StepEffect> {
        match step {
            ScenarioStep::Navigate { target, timeout } => {
                let url = self.resolve_url(target)?;
                let timeout = timeout.unwrap_or(self.config.navigation_timeout());
                if self.config.probe_target {
                    if state.probe.is_none() {
                        state.probe = Some(TargetProbe::new(self.config.poll_interval().max(Duration::from_millis(100)))?);
                    }
                    if let Some(probe) = &state.probe {
                        probe.wait_reachable(&url, timeout).await?;
                    }
                }
                session.navigate(&url, timeout).await?;
                info!("Navigated to {}", url);
                Ok(StepEffect::default())
            }

            ScenarioStep::WaitForReady { condition, timeout, best_effort } => {
                let timeout = timeout.unwrap_or(self.config.default_timeout());
                match state.waiter.wait(session, condition, timeout).await? {
                    Readiness::Ready => Ok(StepEffect::default()),
                    Readiness::TimedOut { condition, waited } if *best_effort => {
                        warn!("{} not satisfied after {}ms; continuing (best effort)", condition, waited.as_millis());
                        Ok(StepEffect {
                            status: Some(StepStatus::TimedOutBestEffort),
                            detail: Some(format!("{} not satisfied within {}ms", condition, waited.as_millis())),
                        })
                    }
                    Readiness::TimedOut { condition, waited } => Err(HarnessError::ReadinessTimeout(format!(
                        "{} not satisfied within {}ms",
                        condition,
                        waited.as_millis()
                    ))),
                }
            }

            ScenarioStep::Interact { action } => match state.interactor.perform(session, action).await? {
                Interaction::Ack => Ok(StepEffect::default()),
                Interaction::TargetUnresolvable(reason) => Err(HarnessError::TargetUnresolvable(reason)),
            },

            ScenarioStep::Capture { label } => {
                let path = state.capturer.capture(session, label).await?;
                Ok(StepEffect {
                    status: None,
                    detail: Some(path.display().to_string()),
                })
            }

            ScenarioStep::AssertVisible { locator, timeout } => {
                if let Locator::Region(region) = locator {
                    if !region.fits(state.viewport) {
                        return Err(HarnessError::TargetUnresolvable(format!(
                            "{} does not fit the {} viewport",
                            locator, state.viewport
                        )));
                    }
                }
                let timeout = timeout.unwrap_or(self.config.default_timeout());
                let condition = ReadinessCondition::ElementPresent(locator.clone());
                match state.waiter.wait(session, &condition, timeout).await? {
                    Readiness::Ready => Ok(StepEffect::default()),
                    Readiness::TimedOut { waited, .. } => Err(HarnessError::ReadinessTimeout(format!(
                        "{} not visible within {}ms",
                        locator,
                        waited.as_millis()
                    ))),
                }
            }
        }
    }

    /// Absolute targets pass through; anything else joins onto `target_url`
    fn resolve_url(&self, target: &str) -> HarnessResult<String> {
        if let Ok(url) = reqwest::Url::parse(target) {
            return Ok(url.to_string());
        }
        let base = reqwest::Url::parse(&self.config.target_url).map_err(|e| {
            HarnessError::NavigationFailure(format!("invalid target url '{}': {}", self.config.target_url, e))
        })?;
        base.join(target)
            .map(|u| u.to_string())
            .map_err(|e| HarnessError::NavigationFailure(format!("cannot resolve '{}': {}", target, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{Script, ScriptedFactory};

    fn runner_for(target_url: &str) -> ScenarioRunner {
        let config = HarnessConfig {
            target_url: target_url.to_string(),
            probe_target: false,
            ..Default::default()
        };
        ScenarioRunner::new(config, Arc::new(ScriptedFactory::new(Script::new(Viewport::default()))))
    }

    #[test]
    fn test_resolve_relative_and_absolute_targets() {
        let runner = runner_for("http://localhost:5173");
        assert_eq!(runner.resolve_url("/").unwrap(), "http://localhost:5173/");
        assert_eq!(runner.resolve_url("scenes/tile").unwrap(), "http://localhost:5173/scenes/tile");
        assert_eq!(
            runner.resolve_url("http://localhost:3001").unwrap(),
            "http://localhost:3001/"
        );
    }

    #[test]
    fn test_invalid_base_is_navigation_failure() {
        let runner = runner_for("not a url");
        assert!(matches!(
            runner.resolve_url("/"),
            Err(HarnessError::NavigationFailure(_))
        ));
    }

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(
            FailureKind::classify(&HarnessError::ReadinessTimeout("canvas".into())),
            FailureKind::ReadinessTimeout
        );
        assert_eq!(
            FailureKind::classify(&HarnessError::Driver("pipe closed".into())),
            FailureKind::SessionFault
        );
    }

    #[test]
    fn test_result_serialization_shape() {
        let result = ScenarioResult::Failure {
            failed_step_index: 1,
            reason: FailureReason {
                kind: FailureKind::ReadinessTimeout,
                message: "canvas never appeared".into(),
            },
            evidence: Some(PathBuf::from("verification/s/r/failure.png")),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "failure");
        assert_eq!(value["failed_step_index"], 1);
        assert_eq!(value["reason"]["kind"], "readiness_timeout");
    }
}
