//! In-memory browser session with scripted page behaviour
//!
//! Used for dry runs of scenario definitions (no browser needed) and by the
//! test suite. A [`Script`] declares which selectors and texts exist, when
//! they appear relative to the last navigation, and which clicks reveal new
//! text. Everything the harness does to the session is recorded in a shared
//! [`ScriptLog`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{HarnessError, HarnessResult};
use crate::locator::{Region, Viewport};
use crate::session::{BrowserSession, ConsoleMessage, PointerEvent, SessionFactory};

/// PNG signature, written as placeholder screenshot content
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Everything a scripted session observed
#[derive(Debug, Default)]
pub struct ScriptLog {
    pub launches: usize,
    pub closes: usize,
    pub navigations: Vec<String>,
    pub events: Vec<PointerEvent>,
    pub screenshots: Vec<PathBuf>,
    /// Number of selector and text lookups
    pub lookups: usize,
}

#[derive(Debug, Clone)]
struct Presence {
    region: Region,
    after: Duration,
}

#[derive(Debug, Clone)]
struct Reveal {
    region: Region,
    text: String,
}

/// Declarative description of how the fake page behaves
#[derive(Debug, Clone)]
pub struct Script {
    viewport: Viewport,
    reported_viewport: Option<Viewport>,
    permissive: bool,
    selectors: HashMap<String, Presence>,
    texts: HashMap<String, Presence>,
    reveals: Vec<Reveal>,
    unreachable: Vec<String>,
    console: Vec<ConsoleMessage>,
    late_console: Vec<ConsoleMessage>,
    fail_screenshots: bool,
    panic_on_pointer: bool,
    log: Arc<Mutex<ScriptLog>>,
}

impl Script {
    /// A blank page of the given size: nothing is present
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            reported_viewport: None,
            permissive: false,
            selectors: HashMap::new(),
            texts: HashMap::new(),
            reveals: Vec::new(),
            unreachable: Vec::new(),
            console: Vec::new(),
            late_console: Vec::new(),
            fail_screenshots: false,
            panic_on_pointer: false,
            log: Arc::new(Mutex::new(ScriptLog::default())),
        }
    }

    /// A page on which every selector and text is immediately present
    pub fn permissive(viewport: Viewport) -> Self {
        Self { permissive: true, ..Self::new(viewport) }
    }

    fn full_screen(&self) -> Region {
        Region::new(0.0, 0.0, self.viewport.width as f64, self.viewport.height as f64)
    }

    pub fn selector(self, selector: &str) -> Self {
        self.selector_after(selector, Duration::ZERO)
    }

    pub fn selector_after(mut self, selector: &str, after: Duration) -> Self {
        let region = self.full_screen();
        self.selectors.insert(selector.to_string(), Presence { region, after });
        self
    }

    pub fn selector_at(mut self, selector: &str, region: Region) -> Self {
        self.selectors
            .insert(selector.to_string(), Presence { region, after: Duration::ZERO });
        self
    }

    pub fn text_at(mut self, text: &str, region: Region) -> Self {
        self.texts.insert(text.to_string(), Presence { region, after: Duration::ZERO });
        self
    }

    pub fn text_after(mut self, text: &str, region: Region, after: Duration) -> Self {
        self.texts.insert(text.to_string(), Presence { region, after });
        self
    }

    /// A click or release inside `region` makes `text` appear
    pub fn reveal_on_click(mut self, region: Region, text: &str) -> Self {
        self.reveals.push(Reveal { region, text: text.to_string() });
        self
    }

    /// Viewport size the page claims, when it differs from the launch size
    pub fn reports_viewport(mut self, viewport: Viewport) -> Self {
        self.reported_viewport = Some(viewport);
        self
    }

    /// Navigations to URLs containing `fragment` fail
    pub fn unreachable(mut self, fragment: &str) -> Self {
        self.unreachable.push(fragment.to_string());
        self
    }

    /// Console messages emitted by each navigation
    pub fn console(mut self, message: ConsoleMessage) -> Self {
        self.console.push(message);
        self
    }

    /// Console messages that only surface while the session shuts down
    pub fn console_on_close(mut self, message: ConsoleMessage) -> Self {
        self.late_console.push(message);
        self
    }

    pub fn fail_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    /// Simulate an unexpected fault inside the automation layer
    pub fn panic_on_pointer(mut self) -> Self {
        self.panic_on_pointer = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<ScriptLog>> {
        Arc::clone(&self.log)
    }
}

/// A [`BrowserSession`] backed by a [`Script`]
pub struct ScriptedSession {
    script: Script,
    origin: Instant,
    revealed: Vec<String>,
    pending_console: Vec<ConsoleMessage>,
}

impl ScriptedSession {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            origin: Instant::now(),
            revealed: Vec::new(),
            pending_console: Vec::new(),
        }
    }

    fn present(&self, presence: Option<&Presence>) -> Option<Region> {
        presence
            .filter(|p| self.origin.elapsed() >= p.after)
            .map(|p| p.region)
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> HarnessResult<()> {
        self.script.log.lock().navigations.push(url.to_string());
        if self.script.unreachable.iter().any(|f| url.contains(f.as_str())) {
            return Err(HarnessError::NavigationFailure(format!(
                "net::ERR_CONNECTION_REFUSED at {}",
                url
            )));
        }
        self.origin = Instant::now();
        self.revealed.clear();
        self.pending_console.extend(self.script.console.iter().cloned());
        Ok(())
    }

    async fn find_selector(&mut self, selector: &str) -> HarnessResult<Option<Region>> {
        self.script.log.lock().lookups += 1;
        if self.script.permissive {
            return Ok(Some(self.script.full_screen()));
        }
        Ok(self.present(self.script.selectors.get(selector)))
    }

    async fn find_text(&mut self, text: &str) -> HarnessResult<Option<Region>> {
        self.script.log.lock().lookups += 1;
        if self.script.permissive {
            return Ok(Some(self.script.full_screen()));
        }
        if let Some(region) = self.present(self.script.texts.get(text)) {
            return Ok(Some(region));
        }
        if self.revealed.iter().any(|t| t == text) {
            return Ok(Some(self.script.full_screen()));
        }
        Ok(None)
    }

    async fn viewport(&mut self) -> HarnessResult<Viewport> {
        Ok(self.script.reported_viewport.unwrap_or(self.script.viewport))
    }

    async fn pointer(&mut self, event: PointerEvent) -> HarnessResult<()> {
        if self.script.panic_on_pointer {
            panic!("scripted fault while dispatching {:?}", event);
        }
        self.script.log.lock().events.push(event);

        if let PointerEvent::Click { at } | PointerEvent::Up { at } = event {
            let hit = Region::new(at.x, at.y, 0.0, 0.0);
            for reveal in &self.script.reveals {
                if reveal.region.covers(&hit) && !self.revealed.contains(&reveal.text) {
                    self.revealed.push(reveal.text.clone());
                }
            }
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> HarnessResult<()> {
        if self.script.fail_screenshots {
            return Err(HarnessError::Driver(format!(
                "page.screenshot: target closed while writing {}",
                path.display()
            )));
        }
        tokio::fs::write(path, PNG_MAGIC).await?;
        self.script.log.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn drain_console(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.pending_console)
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.script.log.lock().closes += 1;
        self.pending_console.extend(self.script.late_console.iter().cloned());
        Ok(())
    }
}

/// Hands out [`ScriptedSession`]s that all report into one log
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    script: Script,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn log(&self) -> Arc<Mutex<ScriptLog>> {
        self.script.log()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn launch(&self, viewport: Viewport) -> HarnessResult<Box<dyn BrowserSession>> {
        self.script.log.lock().launches += 1;
        let mut script = self.script.clone();
        script.viewport = viewport;
        Ok(Box::new(ScriptedSession::new(script)))
    }
}
