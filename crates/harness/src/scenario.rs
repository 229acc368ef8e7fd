//! Declarative scenario definitions
//!
//! A scenario is plain data: an ordered list of steps plus the viewport
//! and render surface it expects. Scenarios come from YAML files or from
//! the built-in [`crate::catalog`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::evidence::{artifact_file_name, FAILURE_LABEL};
use crate::locator::{Locator, Point, Viewport};

/// Serde helpers storing durations as integer milliseconds
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_some(&(d.as_millis() as u64)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
        }
    }
}

/// One verification flow against the game client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name, also used as the output directory
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport the client must render at; falls back to the harness config
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Selector of the root render surface
    #[serde(default = "default_surface")]
    pub surface: String,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

fn default_surface() -> String {
    "canvas".to_string()
}

/// A single declarative unit of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Load a URL, absolute or relative to the configured target
    Navigate {
        target: String,
        #[serde(default, rename = "timeout_ms", with = "millis::option")]
        timeout: Option<Duration>,
    },

    /// Block until a readiness condition holds
    WaitForReady {
        condition: ReadinessCondition,
        #[serde(default, rename = "timeout_ms", with = "millis::option")]
        timeout: Option<Duration>,
        /// Continue on timeout instead of failing the run
        #[serde(default)]
        best_effort: bool,
    },

    /// Dispatch pointer input
    Interact { action: InteractionAction },

    /// Save a screenshot under `label`
    Capture { label: String },

    /// Fail unless the locator becomes visible within the timeout
    AssertVisible {
        locator: Locator,
        #[serde(default, rename = "timeout_ms", with = "millis::option")]
        timeout: Option<Duration>,
    },
}

/// Predicate over remote page state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessCondition {
    ElementPresent(Locator),
    TextPresent(String),
    /// Unconditional sleep, for clients that expose no readiness signal
    #[serde(rename = "fixed_delay_ms", with = "millis")]
    FixedDelay(Duration),
}

impl fmt::Display for ReadinessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessCondition::ElementPresent(locator) => write!(f, "{} present", locator),
            ReadinessCondition::TextPresent(text) => write!(f, "text '{}' present", text),
            ReadinessCondition::FixedDelay(d) => write!(f, "fixed delay of {}ms", d.as_millis()),
        }
    }
}

/// Raw pointer input against the render surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Click {
        at: Point,
    },
    /// Press at `from`, move through `steps` interpolated points, release at `to`
    Drag {
        from: Point,
        to: Point,
        #[serde(default = "default_drag_steps")]
        steps: u32,
    },
    PointerDown {
        at: Point,
    },
    PointerMove {
        to: Point,
    },
    /// Release at the last known pointer position
    PointerUp,
    /// Resolve a locator to its centre and click there
    ClickLocator {
        locator: Locator,
        #[serde(default, rename = "timeout_ms", with = "millis::option")]
        timeout: Option<Duration>,
    },
    /// Probe candidate points until a condition holds
    Search(SearchPolicy),
}

fn default_drag_steps() -> u32 {
    5
}

/// Upper bound on intermediate moves in one drag
pub const MAX_DRAG_STEPS: u32 = 1_000;

/// Bounded search for a target whose position is not statically known.
///
/// Candidates are clicked in order; after each click the `until` condition
/// gets `per_candidate` to hold. The first hit wins. On exhaustion the
/// fallback point is clicked if one is declared, otherwise the target is
/// reported unresolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPolicy {
    pub candidates: Vec<Point>,
    pub until: ReadinessCondition,
    #[serde(default = "default_per_candidate", rename = "per_candidate_ms", with = "millis")]
    pub per_candidate: Duration,
    #[serde(default)]
    pub fallback: Option<Point>,
}

fn default_per_candidate() -> Duration {
    Duration::from_millis(200)
}

impl SearchPolicy {
    /// Row-major grid over half-open ranges, x outer and y inner
    pub fn grid(x: (u32, u32), y: (u32, u32), step: u32, until: ReadinessCondition) -> Self {
        let step = step.max(1) as usize;
        let candidates = (x.0..x.1)
            .step_by(step)
            .flat_map(|px| {
                (y.0..y.1)
                    .step_by(step)
                    .map(move |py| Point::new(px as f64, py as f64))
            })
            .collect();
        Self {
            candidates,
            until,
            per_candidate: default_per_candidate(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Point) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn per_candidate(mut self, budget: Duration) -> Self {
        self.per_candidate = budget;
        self
    }
}

impl ScenarioStep {
    pub fn navigate(target: impl Into<String>) -> Self {
        Self::Navigate { target: target.into(), timeout: None }
    }

    pub fn wait(condition: ReadinessCondition, timeout: Duration) -> Self {
        Self::WaitForReady { condition, timeout: Some(timeout), best_effort: false }
    }

    pub fn wait_for_surface(selector: &str, timeout: Duration) -> Self {
        Self::wait(ReadinessCondition::ElementPresent(Locator::selector(selector)), timeout)
    }

    pub fn settle(delay: Duration) -> Self {
        Self::WaitForReady {
            condition: ReadinessCondition::FixedDelay(delay),
            timeout: None,
            best_effort: false,
        }
    }

    pub fn click(at: Point) -> Self {
        Self::Interact { action: InteractionAction::Click { at } }
    }

    pub fn click_locator(locator: Locator) -> Self {
        Self::Interact {
            action: InteractionAction::ClickLocator { locator, timeout: None },
        }
    }

    pub fn capture(label: impl Into<String>) -> Self {
        Self::Capture { label: label.into() }
    }

    /// Short name used in logs and reports
    pub fn describe(&self) -> String {
        match self {
            ScenarioStep::Navigate { target, .. } => format!("navigate:{}", target),
            ScenarioStep::WaitForReady { condition, best_effort, .. } => {
                let suffix = if *best_effort { " (best effort)" } else { "" };
                format!("wait:{}{}", condition, suffix)
            }
            ScenarioStep::Interact { action } => match action {
                InteractionAction::Click { at } => format!("click:{}", at),
                InteractionAction::Drag { from, to, steps } => {
                    format!("drag:{}->{} in {} steps", from, to, steps)
                }
                InteractionAction::PointerDown { at } => format!("pointer-down:{}", at),
                InteractionAction::PointerMove { to } => format!("pointer-move:{}", to),
                InteractionAction::PointerUp => "pointer-up".to_string(),
                InteractionAction::ClickLocator { locator, .. } => format!("click:{}", locator),
                InteractionAction::Search(policy) => format!(
                    "search:{} candidates until {}",
                    policy.candidates.len(),
                    policy.until
                ),
            },
            ScenarioStep::Capture { label } => format!("capture:{}", label),
            ScenarioStep::AssertVisible { locator, .. } => format!("assert-visible:{}", locator),
        }
    }

    fn needs_surface(&self) -> bool {
        matches!(self, ScenarioStep::Interact { .. } | ScenarioStep::Capture { .. })
    }

    fn confirms_surface(&self, surface: &str) -> bool {
        matches!(
            self,
            ScenarioStep::WaitForReady {
                condition: ReadinessCondition::ElementPresent(Locator::Selector(s)),
                ..
            } if s == surface
        )
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            viewport: None,
            surface: default_surface(),
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = ScenarioStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Reject scenarios that could never run correctly, before any browser
    /// is launched.
    pub fn validate(&self) -> HarnessResult<()> {
        let invalid = |msg: String| -> HarnessResult<()> {
            Err(HarnessError::InvalidScenario(format!("{}: {}", self.name, msg)))
        };

        if self.name.trim().is_empty() {
            return Err(HarnessError::InvalidScenario("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return invalid("no steps declared".to_string());
        }

        let mut surface_confirmed = false;
        let mut artifacts: HashMap<String, &str> = HashMap::new();

        for (index, step) in self.steps.iter().enumerate() {
            // A new document has to render again
            if let ScenarioStep::Navigate { .. } = step {
                surface_confirmed = false;
            }
            if step.confirms_surface(&self.surface) {
                surface_confirmed = true;
            }
            if let ScenarioStep::Interact {
                action: InteractionAction::Drag { steps, .. },
            } = step
            {
                if *steps > MAX_DRAG_STEPS {
                    return invalid(format!(
                        "step {} drags in {} steps; at most {} are allowed",
                        index, steps, MAX_DRAG_STEPS
                    ));
                }
            }
            if step.needs_surface() && !surface_confirmed {
                return invalid(format!(
                    "step {} ({}) runs before any wait for the '{}' surface",
                    index,
                    step.describe(),
                    self.surface
                ));
            }
            if let ScenarioStep::Capture { label } = step {
                let file = artifact_file_name(label);
                if file == artifact_file_name(FAILURE_LABEL) {
                    return invalid(format!("capture label '{}' is reserved for failure evidence", label));
                }
                if let Some(previous) = artifacts.insert(file.clone(), label) {
                    return invalid(format!(
                        "capture labels '{}' and '{}' both write {}",
                        previous, label, file
                    ));
                }
            }
        }

        Ok(())
    }
}
