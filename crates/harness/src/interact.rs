//! Coordinate-based input against the render surface
//!
//! Everything ends up as raw pointer events at viewport coordinates. Chrome
//! locators are looked up structurally first and then clicked at their
//! centre, so both resolution modes share one dispatch path.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::HarnessResult;
use crate::locator::{Locator, Point, Viewport};
use crate::readiness::{Readiness, ReadinessWaiter};
use crate::scenario::{InteractionAction, ReadinessCondition, SearchPolicy, MAX_DRAG_STEPS};
use crate::session::{BrowserSession, PointerEvent};

/// Outcome of a single interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Ack,
    TargetUnresolvable(String),
}

/// Translates [`InteractionAction`]s into pointer event sequences
pub struct CoordinateInteractor {
    viewport: Viewport,
    waiter: ReadinessWaiter,
    default_timeout: Duration,
    /// Last position the pointer was sent to
    cursor: Option<Point>,
    viewport_confirmed: bool,
}

impl CoordinateInteractor {
    pub fn new(viewport: Viewport, waiter: ReadinessWaiter, default_timeout: Duration) -> Self {
        Self {
            viewport,
            waiter,
            default_timeout,
            cursor: None,
            viewport_confirmed: false,
        }
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    /// Event sequence for a drag: press at `from`, `steps` moves strictly
    /// between the endpoints, release at `to`. Never a click.
    pub fn drag_events(from: Point, to: Point, steps: u32) -> Vec<PointerEvent> {
        let steps = steps.clamp(1, MAX_DRAG_STEPS);
        let mut events = Vec::with_capacity(steps as usize + 2);
        events.push(PointerEvent::Down { at: from });
        for i in 1..=steps {
            let t = f64::from(i) / (f64::from(steps) + 1.0);
            events.push(PointerEvent::Move { at: from.lerp(to, t) });
        }
        events.push(PointerEvent::Up { at: to });
        events
    }

    pub async fn perform(
        &mut self,
        session: &mut dyn BrowserSession,
        action: &InteractionAction,
    ) -> HarnessResult<Interaction> {
        if let Some(reason) = self.confirm_viewport(session).await? {
            return Ok(Interaction::TargetUnresolvable(reason));
        }

        match action {
            InteractionAction::Click { at } => self.click(session, *at).await,
            InteractionAction::Drag { from, to, steps } => {
                for p in [from, to] {
                    if let Err(reason) = self.in_viewport(*p) {
                        return Ok(Interaction::TargetUnresolvable(reason));
                    }
                }
                if *steps == 0 {
                    debug!("Drag declared with 0 steps, using 1");
                }
                self.dispatch(session, Self::drag_events(*from, *to, *steps)).await?;
                Ok(Interaction::Ack)
            }
            InteractionAction::PointerDown { at } => {
                self.single(session, *at, |at| PointerEvent::Down { at }).await
            }
            InteractionAction::PointerMove { to } => {
                self.single(session, *to, |at| PointerEvent::Move { at }).await
            }
            InteractionAction::PointerUp => match self.cursor {
                Some(at) => {
                    self.dispatch(session, vec![PointerEvent::Up { at }]).await?;
                    Ok(Interaction::Ack)
                }
                None => Ok(Interaction::TargetUnresolvable(
                    "pointer-up with no prior pointer position".to_string(),
                )),
            },
            InteractionAction::ClickLocator { locator, timeout } => {
                self.click_locator(session, locator, timeout.unwrap_or(self.default_timeout))
                    .await
            }
            InteractionAction::Search(policy) => self.search(session, policy).await,
        }
    }

    async fn confirm_viewport(
        &mut self,
        session: &mut dyn BrowserSession,
    ) -> HarnessResult<Option<String>> {
        if self.viewport_confirmed {
            return Ok(None);
        }
        let actual = session.viewport().await?;
        if actual != self.viewport {
            warn!("Viewport mismatch: page renders at {}, coordinates assume {}", actual, self.viewport);
            return Ok(Some(format!(
                "page renders at {} but coordinates were declared for {}",
                actual, self.viewport
            )));
        }
        self.viewport_confirmed = true;
        Ok(None)
    }

    fn in_viewport(&self, point: Point) -> Result<Point, String> {
        if self.viewport.contains(point) {
            Ok(point)
        } else {
            Err(format!("point {} lies outside the {} viewport", point, self.viewport))
        }
    }

    async fn single(
        &mut self,
        session: &mut dyn BrowserSession,
        at: Point,
        event: impl FnOnce(Point) -> PointerEvent,
    ) -> HarnessResult<Interaction> {
        match self.in_viewport(at) {
            Ok(at) => {
                self.dispatch(session, vec![event(at)]).await?;
                Ok(Interaction::Ack)
            }
            Err(reason) => Ok(Interaction::TargetUnresolvable(reason)),
        }
    }

    async fn click(&mut self, session: &mut dyn BrowserSession, at: Point) -> HarnessResult<Interaction> {
        self.single(session, at, |at| PointerEvent::Click { at }).await
    }

    async fn click_locator(
        &mut self,
        session: &mut dyn BrowserSession,
        locator: &Locator,
        timeout: Duration,
    ) -> HarnessResult<Interaction> {
        let target = match locator {
            Locator::Region(region) => {
                if !region.fits(self.viewport) {
                    return Ok(Interaction::TargetUnresolvable(format!(
                        "{} does not fit the {} viewport",
                        locator, self.viewport
                    )));
                }
                region.center()
            }
            Locator::Selector(_) | Locator::Text(_) => {
                let condition = ReadinessCondition::ElementPresent(locator.clone());
                if let Readiness::TimedOut { .. } =
                    self.waiter.wait(session, &condition, timeout).await?
                {
                    return Ok(Interaction::TargetUnresolvable(format!(
                        "{} not found within {}ms",
                        locator,
                        timeout.as_millis()
                    )));
                }
                match self.waiter.locate(session, locator).await? {
                    Some(bounds) => bounds.center(),
                    None => {
                        return Ok(Interaction::TargetUnresolvable(format!(
                            "{} disappeared before it could be clicked",
                            locator
                        )))
                    }
                }
            }
        };
        debug!("Resolved {} to {}", locator, target);
        self.click(session, target).await
    }

    async fn search(
        &mut self,
        session: &mut dyn BrowserSession,
        policy: &SearchPolicy,
    ) -> HarnessResult<Interaction> {
        let mut points = policy.candidates.iter().chain(policy.fallback.iter());
        if let Some(outside) = points.find(|p| !self.viewport.contains(**p)) {
            return Ok(Interaction::TargetUnresolvable(format!(
                "search point {} lies outside the {} viewport",
                outside, self.viewport
            )));
        }

        for (index, candidate) in policy.candidates.iter().enumerate() {
            self.dispatch(session, vec![PointerEvent::Click { at: *candidate }]).await?;
            if self
                .waiter
                .wait(session, &policy.until, policy.per_candidate)
                .await?
                .is_ready()
            {
                info!("Search hit at {} (candidate {} of {})", candidate, index + 1, policy.candidates.len());
                return Ok(Interaction::Ack);
            }
        }

        match policy.fallback {
            Some(fallback) => {
                warn!(
                    "No candidate satisfied {}; clicking fallback {}",
                    policy.until, fallback
                );
                self.dispatch(session, vec![PointerEvent::Click { at: fallback }]).await?;
                Ok(Interaction::Ack)
            }
            None => Ok(Interaction::TargetUnresolvable(format!(
                "none of {} candidate point(s) produced {}",
                policy.candidates.len(),
                policy.until
            ))),
        }
    }

    async fn dispatch(
        &mut self,
        session: &mut dyn BrowserSession,
        events: Vec<PointerEvent>,
    ) -> HarnessResult<()> {
        for event in events {
            session.pointer(event).await?;
            self.cursor = Some(event.position());
        }
        Ok(())
    }
}
