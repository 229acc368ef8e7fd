//! Polling readiness checks against the remote page

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::error::HarnessResult;
use crate::locator::{Locator, Region};
use crate::scenario::ReadinessCondition;
use crate::session::BrowserSession;

/// Lower bound between two evaluations of a condition
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of waiting on a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    TimedOut {
        /// What failed to appear
        condition: String,
        waited: Duration,
    },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Re-evaluates readiness conditions until they hold or a budget runs out
#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    /// Selector of the render surface, used to place region locators
    surface: String,
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration, surface: impl Into<String>) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            surface: surface.into(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `condition` holds or `timeout` elapses.
    ///
    /// The condition is always evaluated once more at the deadline, so a
    /// zero timeout still performs a single check. `FixedDelay` ignores
    /// `timeout` and is ready once its own delay has passed.
    pub async fn wait(
        &self,
        session: &mut dyn BrowserSession,
        condition: &ReadinessCondition,
        timeout: Duration,
    ) -> HarnessResult<Readiness> {
        if let ReadinessCondition::FixedDelay(delay) = condition {
            debug!("Sleeping {}ms (no structural readiness signal)", delay.as_millis());
            sleep(*delay).await;
            return Ok(Readiness::Ready);
        }

        let start = Instant::now();
        let deadline = start + timeout;
        let mut checks = 0u32;

        loop {
            checks += 1;
            if self.holds(session, condition).await? {
                debug!("{} after {} check(s)", condition, checks);
                return Ok(Readiness::Ready);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Gave up on {} after {} check(s)", condition, checks);
                return Ok(Readiness::TimedOut {
                    condition: condition.to_string(),
                    waited: now - start,
                });
            }

            let pause = self.poll_interval.min(deadline - now);
            trace!("{} not yet satisfied, next check in {:?}", condition, pause);
            sleep(pause).await;
        }
    }

    /// Evaluate a condition once
    pub async fn holds(
        &self,
        session: &mut dyn BrowserSession,
        condition: &ReadinessCondition,
    ) -> HarnessResult<bool> {
        match condition {
            ReadinessCondition::ElementPresent(locator) => {
                Ok(self.locate(session, locator).await?.is_some())
            }
            ReadinessCondition::TextPresent(text) => Ok(session.find_text(text).await?.is_some()),
            ReadinessCondition::FixedDelay(_) => Ok(true),
        }
    }

    /// Resolve a locator to its on-screen box, if it is currently visible.
    ///
    /// A region counts as visible once the render surface exists and covers
    /// it, give or take the region's tolerance.
    pub async fn locate(
        &self,
        session: &mut dyn BrowserSession,
        locator: &Locator,
    ) -> HarnessResult<Option<Region>> {
        match locator {
            Locator::Selector(selector) => session.find_selector(selector).await,
            Locator::Text(text) => session.find_text(text).await,
            Locator::Region(region) => {
                let surface = session.find_selector(&self.surface).await?;
                Ok(surface.filter(|s| s.covers(region)).map(|_| *region))
            }
        }
    }
}
