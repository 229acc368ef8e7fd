//! CLI Commands

pub mod assets;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use scenecheck_harness::playwright::{Browser, PlaywrightConfig, PlaywrightLauncher};
use scenecheck_harness::scripted::{Script, ScriptedFactory};
use scenecheck_harness::{HarnessConfig, SessionFactory, Viewport};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "scenecheck.yaml";

/// Overrides for the harness configuration, shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Harness config file (YAML)
    #[arg(long, env = "SCENECHECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// URL the client is served at
    #[arg(long, env = "SCENECHECK_TARGET_URL", global = true)]
    pub target_url: Option<String>,

    /// Viewport as WIDTHxHEIGHT, for scenarios that declare none
    #[arg(long, env = "SCENECHECK_VIEWPORT", global = true)]
    pub viewport: Option<Viewport>,

    /// Root directory for screenshots and reports
    #[arg(long, env = "SCENECHECK_OUTPUT", global = true)]
    pub output: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "SCENECHECK_BROWSER", global = true)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Fixed run id instead of a timestamped one
    #[arg(long, env = "SCENECHECK_RUN_ID", global = true)]
    pub run_id: Option<String>,

    /// Skip the HTTP reachability probe before navigating
    #[arg(long, global = true)]
    pub no_probe: bool,

    /// Directory where Playwright is installed (contains node_modules)
    #[arg(long, env = "SCENECHECK_PLAYWRIGHT_DIR", global = true)]
    pub playwright_dir: Option<PathBuf>,
}

impl HarnessArgs {
    /// File config, then flags and environment on top
    pub fn resolve(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
            None => HarnessConfig::default(),
        };

        if let Some(url) = &self.target_url {
            config.target_url = url.clone();
        }
        if let Some(viewport) = self.viewport {
            config.viewport = viewport;
        }
        if let Some(output) = &self.output {
            config.output_root = output.clone();
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(run_id) = &self.run_id {
            config.run_id = Some(run_id.clone());
        }
        if self.no_probe {
            config.probe_target = false;
        }

        debug!("Harness config: {:?}", config);
        Ok(config)
    }

    /// Real browser sessions, or scripted ones for a dry run
    pub fn factory(&self, config: &mut HarnessConfig, dry_run: bool) -> anyhow::Result<Arc<dyn SessionFactory>> {
        if dry_run {
            config.probe_target = false;
            return Ok(Arc::new(ScriptedFactory::new(Script::permissive(config.viewport))));
        }

        let playwright = PlaywrightConfig {
            browser: config.browser,
            headless: config.headless,
            working_dir: self.playwright_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            ..Default::default()
        };
        let launcher = PlaywrightLauncher::new(playwright)
            .context("Playwright is required for real runs (npm install -D playwright && npx playwright install)")?;
        Ok(Arc::new(launcher))
    }
}

fn load_config(path: &Path) -> anyhow::Result<HarnessConfig> {
    HarnessConfig::from_file(path).with_context(|| format!("failed to load config {}", path.display()))
}
