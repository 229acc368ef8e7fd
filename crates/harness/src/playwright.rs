//! Playwright browser automation
//!
//! A small Node driver script owns the actual browser. The harness talks to
//! it over stdin/stdout using one JSON object per line: commands carry an
//! `id`, responses echo it, and console output from the page streams back as
//! `event` lines in between.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::locator::{Region, Viewport};
use crate::session::{BrowserSession, ConsoleLevel, ConsoleMessage, PointerEvent, SessionFactory};

const DRIVER_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require(require.resolve('playwright', { paths: [process.cwd(), __dirname] }));

const [browserName, width, height, headless] = process.argv.slice(2);

function emit(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

(async () => {
  let browser;
  let page;
  try {
    browser = await playwright[browserName].launch({ headless: headless === 'true' });
    const context = await browser.newContext({
      viewport: { width: Number(width), height: Number(height) }
    });
    page = await context.newPage();
  } catch (error) {
    emit({ event: 'fatal', error: error.message });
    process.exit(1);
  }

  page.on('console', msg => emit({ event: 'console', level: msg.type(), text: msg.text() }));
  page.on('pageerror', err => emit({ event: 'pageerror', text: String(err) }));

  const visibleBox = async (locator) => {
    const first = locator.first();
    const visible = await first.isVisible().catch(() => false);
    return visible ? await first.boundingBox() : null;
  };

  const handlers = {
    goto: c => page.goto(c.url, { timeout: c.timeout_ms }).then(() => null),
    query: c => visibleBox(page.locator(c.selector)),
    text: c => visibleBox(page.getByText(c.text)),
    viewport: () => page.evaluate(() => ({ width: window.innerWidth, height: window.innerHeight })),
    pointer: async c => {
      const mouse = page.mouse;
      switch (c.kind) {
        case 'move': await mouse.move(c.at.x, c.at.y); break;
        case 'down': await mouse.move(c.at.x, c.at.y); await mouse.down(); break;
        case 'up': await mouse.move(c.at.x, c.at.y); await mouse.up(); break;
        case 'click': await mouse.click(c.at.x, c.at.y); break;
        default: throw new Error('unknown pointer event ' + c.kind);
      }
      return null;
    },
    screenshot: c => page.screenshot({ path: c.path }).then(() => null),
    close: () => browser.close().then(() => null),
  };

  emit({ event: 'ready' });

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    if (!line.trim()) continue;
    const command = JSON.parse(line);
    try {
      const handler = handlers[command.op];
      if (!handler) throw new Error('unknown op ' + command.op);
      const result = await handler(command);
      emit({ id: command.id, ok: true, result: result === undefined ? null : result });
    } catch (error) {
      emit({ id: command.id, ok: false, error: error.message });
    }
    if (command.op === 'close') process.exit(0);
  }
  await browser.close();
})();
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    /// Node executable
    pub node: PathBuf,
    /// Directory from which `playwright` is resolvable (its `node_modules`)
    pub working_dir: PathBuf,
    /// Budget for browser startup
    pub launch_timeout: Duration,
    /// Budget for a single driver command on top of its own timeout
    pub command_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node: PathBuf::from("node"),
            working_dir: PathBuf::from("."),
            launch_timeout: Duration::from_secs(60),
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Starts a fresh Playwright browser for every run
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> HarnessResult<Self> {
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(config: &PlaywrightConfig) -> HarnessResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightLauncher {
    async fn launch(&self, viewport: Viewport) -> HarnessResult<Box<dyn BrowserSession>> {
        let session = PlaywrightSession::spawn(&self.config, viewport).await?;
        Ok(Box::new(session))
    }
}

/// Commands understood by the driver script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    Query { selector: &'a str },
    Text { text: &'a str },
    Viewport,
    Pointer {
        #[serde(flatten)]
        event: PointerEvent,
    },
    Screenshot { path: &'a Path },
    Close,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

/// Any line the driver prints: a response or an event
#[derive(Debug, Default, Deserialize)]
struct DriverLine {
    id: Option<u64>,
    ok: Option<bool>,
    #[serde(default)]
    result: serde_json::Value,
    error: Option<String>,
    event: Option<String>,
    level: Option<String>,
    text: Option<String>,
}

impl DriverLine {
    fn console_message(&self) -> Option<ConsoleMessage> {
        let level = match (self.event.as_deref()?, self.level.as_deref()) {
            ("pageerror", _) => ConsoleLevel::PageError,
            ("console", Some("error")) => ConsoleLevel::Error,
            ("console", Some("warning")) => ConsoleLevel::Warning,
            ("console", Some("info")) => ConsoleLevel::Info,
            ("console", Some("debug")) => ConsoleLevel::Debug,
            ("console", _) => ConsoleLevel::Log,
            _ => return None,
        };
        Some(ConsoleMessage {
            level,
            text: self.text.clone().unwrap_or_default(),
        })
    }
}

/// A browser page driven through the Node driver process
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    console: Vec<ConsoleMessage>,
    command_timeout: Duration,
    closed: bool,
    // Holds the driver script on disk for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    pub async fn spawn(config: &PlaywrightConfig, viewport: Viewport) -> HarnessResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("scenecheck-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        info!(
            "Launching {} ({}, headless: {})",
            config.browser.as_str(),
            viewport,
            config.headless
        );

        let mut child = TokioCommand::new(&config.node)
            .arg(&script_path)
            .arg(config.browser.as_str())
            .arg(viewport.width.to_string())
            .arg(viewport.height.to_string())
            .arg(config.headless.to_string())
            .current_dir(&config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarnessError::Driver(format!("failed to spawn {}: {}", config.node.display(), e)))?;

        let stdin = child.stdin.take().ok_or_else(|| HarnessError::Driver("driver stdin unavailable".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| HarnessError::Driver("driver stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("driver stderr: {}", line);
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            console: Vec::new(),
            command_timeout: config.command_timeout,
            closed: false,
            _script_dir: script_dir,
        };

        tokio::time::timeout(config.launch_timeout, session.await_ready())
            .await
            .map_err(|_| {
                HarnessError::Driver(format!(
                    "browser did not start within {}s",
                    config.launch_timeout.as_secs()
                ))
            })??;

        Ok(session)
    }

    async fn await_ready(&mut self) -> HarnessResult<()> {
        loop {
            let line = self.next_line().await?;
            match line.event.as_deref() {
                Some("ready") => return Ok(()),
                Some("fatal") => {
                    return Err(HarnessError::Driver(format!(
                        "browser launch failed: {}",
                        line.error.unwrap_or_default()
                    )))
                }
                _ => {}
            }
        }
    }

    async fn next_line(&mut self) -> HarnessResult<DriverLine> {
        loop {
            let raw = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| HarnessError::Driver("driver process exited".into()))?;
            match serde_json::from_str::<DriverLine>(&raw) {
                Ok(line) => return Ok(line),
                Err(_) => debug!("driver: {}", raw),
            }
        }
    }

    async fn read_response(&mut self, id: u64) -> HarnessResult<DriverLine> {
        loop {
            let line = self.next_line().await?;
            if let Some(message) = line.console_message() {
                self.console.push(message);
                continue;
            }
            if line.id == Some(id) {
                return Ok(line);
            }
        }
    }

    async fn request(
        &mut self,
        command: DriverCommand<'_>,
        extra: Duration,
    ) -> HarnessResult<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;
        let mut payload = serde_json::to_string(&Envelope { id, command })?;
        payload.push('\n');
        self.stdin.write_all(payload.as_bytes()).await?;
        self.stdin.flush().await?;

        let budget = self.command_timeout + extra;
        let response = tokio::time::timeout(budget, self.read_response(id))
            .await
            .map_err(|_| {
                HarnessError::Driver(format!("driver did not answer within {}ms", budget.as_millis()))
            })??;

        if response.ok == Some(true) {
            Ok(response.result)
        } else {
            Err(HarnessError::Driver(
                response.error.unwrap_or_else(|| "unknown driver error".to_string()),
            ))
        }
    }

    async fn bounding_box(&mut self, command: DriverCommand<'_>) -> HarnessResult<Option<Region>> {
        let value = self.request(command, Duration::ZERO).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Stop the driver process, politely first
    async fn shutdown(&mut self) {
        if let Ok(Ok(_)) = tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            return;
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
            }
        }

        // Force kill if still running
        let _ = self.child.kill().await;
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarnessResult<()> {
        let command = DriverCommand::Goto { url, timeout_ms: timeout.as_millis() as u64 };
        match self.request(command, timeout).await {
            Ok(_) => Ok(()),
            Err(HarnessError::Driver(reason)) => Err(HarnessError::NavigationFailure(reason)),
            Err(e) => Err(e),
        }
    }

    async fn find_selector(&mut self, selector: &str) -> HarnessResult<Option<Region>> {
        self.bounding_box(DriverCommand::Query { selector }).await
    }

    async fn find_text(&mut self, text: &str) -> HarnessResult<Option<Region>> {
        self.bounding_box(DriverCommand::Text { text }).await
    }

    async fn viewport(&mut self) -> HarnessResult<Viewport> {
        let value = self.request(DriverCommand::Viewport, Duration::ZERO).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn pointer(&mut self, event: PointerEvent) -> HarnessResult<()> {
        self.request(DriverCommand::Pointer { event }, Duration::ZERO).await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> HarnessResult<()> {
        // The driver runs in its own working directory
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        self.request(DriverCommand::Screenshot { path: &absolute }, Duration::ZERO)
            .await?;
        Ok(())
    }

    fn drain_console(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.console)
    }

    async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.request(DriverCommand::Close, Duration::ZERO).await;
        if let Err(e) = &result {
            warn!("Browser did not close cleanly: {}", e);
        }
        self.shutdown().await;
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Point;

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_pointer_command_wire_shape() {
        let envelope = Envelope {
            id: 7,
            command: DriverCommand::Pointer {
                event: PointerEvent::Down { at: Point::new(100.0, 100.0) },
            },
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": 7, "op": "pointer", "kind": "down", "at": { "x": 100.0, "y": 100.0 } })
        );
    }

    #[test]
    fn test_goto_command_wire_shape() {
        let envelope = Envelope {
            id: 1,
            command: DriverCommand::Goto { url: "http://localhost:5173/", timeout_ms: 30000 },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"id":1,"op":"goto","url":"http://localhost:5173/","timeout_ms":30000}"#);
    }

    #[test]
    fn test_driver_lines() {
        let response: DriverLine =
            serde_json::from_str(r#"{"id":3,"ok":true,"result":{"x":0,"y":0,"width":360,"height":640}}"#)
                .unwrap();
        assert_eq!(response.id, Some(3));
        assert!(response.console_message().is_none());
        let region: Region = serde_json::from_value(response.result).unwrap();
        assert_eq!(region, Region::new(0.0, 0.0, 360.0, 640.0));

        let console: DriverLine =
            serde_json::from_str(r#"{"event":"console","level":"warning","text":"AssetLoader: slow"}"#).unwrap();
        assert_eq!(
            console.console_message(),
            Some(ConsoleMessage { level: ConsoleLevel::Warning, text: "AssetLoader: slow".into() })
        );

        let crash: DriverLine =
            serde_json::from_str(r#"{"event":"pageerror","text":"TypeError: x is undefined"}"#).unwrap();
        assert_eq!(crash.console_message().map(|m| m.level), Some(ConsoleLevel::PageError));

        let ready: DriverLine = serde_json::from_str(r#"{"event":"ready"}"#).unwrap();
        assert!(ready.console_message().is_none());
    }
}
