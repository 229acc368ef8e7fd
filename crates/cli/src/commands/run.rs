//! Scenario commands: run, run-all, list

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use scenecheck_harness::runner::StepStatus;
use scenecheck_harness::{catalog, RunReport, Scenario, ScenarioResult, ScenarioRunner, SuiteResult};

use super::HarnessArgs;
use crate::output::{self, OutputFormat, TableDisplay};

/// Directory searched for scenario files by default
pub const DEFAULT_SCENARIO_DIR: &str = "scenarios";

#[derive(Args)]
pub struct RunArgs {
    /// Built-in scenario name, scenario name in --dir, or path to a YAML file
    pub scenario: String,

    /// Directory with scenario YAML files
    #[arg(long, default_value = DEFAULT_SCENARIO_DIR)]
    pub dir: PathBuf,

    /// Execute against a scripted page instead of a browser
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct RunAllArgs {
    /// Directory with scenario YAML files; built-in scenarios when omitted
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Only run scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Number of scenarios to run at once
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Execute against a scripted page instead of a browser
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Also list scenario files from this directory
    #[arg(long, default_value = DEFAULT_SCENARIO_DIR)]
    pub dir: PathBuf,
}

#[derive(Serialize)]
struct ScenarioRow {
    name: String,
    source: String,
    steps: usize,
    tags: Vec<String>,
    description: String,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Source", "Steps", "Tags", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.source.clone(),
            self.steps.to_string(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

#[derive(Serialize)]
struct RunRow {
    scenario: String,
    outcome: String,
    failed_step: Option<usize>,
    reason: Option<String>,
    artifacts: usize,
    duration_ms: u64,
}

impl From<&RunReport> for RunRow {
    fn from(report: &RunReport) -> Self {
        let (outcome, failed_step, reason, artifacts) = match &report.result {
            ScenarioResult::Success { evidence } => ("passed", None, None, evidence.len()),
            ScenarioResult::Failure { failed_step_index, reason, evidence } => (
                "failed",
                Some(*failed_step_index),
                Some(reason.kind.to_string()),
                usize::from(evidence.is_some()),
            ),
        };
        Self {
            scenario: report.scenario.clone(),
            outcome: outcome.to_string(),
            failed_step,
            reason,
            artifacts,
            duration_ms: report.duration_ms,
        }
    }
}

impl TableDisplay for RunRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Outcome", "Failed Step", "Reason", "Artifacts", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let outcome = if self.outcome == "passed" {
            self.outcome.green().to_string()
        } else {
            self.outcome.red().to_string()
        };
        vec![
            self.scenario.clone(),
            outcome,
            self.failed_step.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()),
            self.reason.clone().unwrap_or_else(|| "-".to_string()),
            self.artifacts.to_string(),
            format!("{} ms", self.duration_ms),
        ]
    }
}

/// Find a scenario by file path, built-in name, or name in `dir`
fn resolve_scenario(wanted: &str, dir: &Path) -> anyhow::Result<Scenario> {
    let path = Path::new(wanted);
    if path.is_file() {
        return Scenario::from_file(path).with_context(|| format!("failed to load {}", path.display()));
    }
    if let Some(scenario) = catalog::find(wanted) {
        return Ok(scenario);
    }
    if dir.is_dir() {
        let scenarios = Scenario::load_all(dir)?;
        if let Some(scenario) = scenarios.into_iter().find(|s| s.name == wanted) {
            return Ok(scenario);
        }
    }
    bail!("no scenario named '{}' (see `scenecheck list`)", wanted)
}

pub async fn run(args: RunArgs, harness: &HarnessArgs, format: OutputFormat) -> anyhow::Result<()> {
    let scenario = resolve_scenario(&args.scenario, &args.dir)?;
    let mut config = harness.resolve()?;
    let factory = harness.factory(&mut config, args.dry_run)?;
    if args.dry_run {
        info!("Dry run: executing '{}' against a scripted page", scenario.name);
    }

    let runner = ScenarioRunner::new(config, factory);
    let report = runner.run(&scenario).await?;

    match format {
        OutputFormat::Table => print_report(&report),
        _ => output::print_document(&report, format),
    }

    if !report.result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn run_all(args: RunAllArgs, harness: &HarnessArgs, format: OutputFormat) -> anyhow::Result<()> {
    let scenarios = match &args.dir {
        Some(dir) => Scenario::load_all(dir).with_context(|| format!("failed to load scenarios from {}", dir.display()))?,
        None => catalog::all(),
    };
    let scenarios: Vec<Scenario> = match &args.tag {
        Some(tag) => Scenario::filter_by_tag(&scenarios, tag).into_iter().cloned().collect(),
        None => scenarios,
    };
    if scenarios.is_empty() {
        output::print_warning("No scenarios matched");
        return Ok(());
    }

    let mut config = harness.resolve()?;
    let factory = harness.factory(&mut config, args.dry_run)?;
    let runner = ScenarioRunner::new(config, factory);
    let suite = runner.run_concurrent(&scenarios, args.jobs).await?;

    match format {
        OutputFormat::Table => print_suite(&suite),
        _ => output::print_document(&suite, format),
    }

    if suite.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

pub fn list(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut rows: Vec<ScenarioRow> = catalog::all()
        .into_iter()
        .map(|s| row_for(&s, "built-in".to_string()))
        .collect();

    if args.dir.is_dir() {
        for scenario in Scenario::load_all(&args.dir)? {
            rows.push(row_for(&scenario, args.dir.display().to_string()));
        }
    }

    output::print_list(&rows, format);
    Ok(())
}

fn row_for(scenario: &Scenario, source: String) -> ScenarioRow {
    ScenarioRow {
        name: scenario.name.clone(),
        source,
        steps: scenario.steps.len(),
        tags: scenario.tags.clone(),
        description: scenario.description.clone(),
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!(" {} {}", "Scenario".bold(), report.scenario.cyan());
    println!("{}", "━".repeat(60).dimmed());
    println!("   Run:      {}", report.run_id);
    println!("   Target:   {}", report.target_url);
    println!("   Viewport: {}", report.viewport);
    println!();

    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Passed => "✓".green(),
            StepStatus::TimedOutBestEffort => "~".yellow(),
            StepStatus::Failed => "✗".red(),
        };
        println!("   {} [{}] {} ({} ms)", mark, step.index, step.step, step.duration_ms);
    }
    println!();

    if !report.console.is_empty() {
        println!("{}", "Console".bold());
        for message in &report.console {
            println!("   {}", message.to_string().dimmed());
        }
        println!();
    }

    match &report.result {
        ScenarioResult::Success { evidence } => {
            output::print_success(&format!("{} passed", report.scenario));
            for path in evidence {
                println!("   • {}", path.display());
            }
        }
        ScenarioResult::Failure { reason, evidence, .. } => {
            output::print_error(&reason.to_string());
            match evidence {
                Some(path) => println!("   Evidence: {}", path.display()),
                None => output::print_warning("No failure screenshot could be taken"),
            }
        }
    }
    if let Some(path) = &report.report_path {
        output::print_info(&format!("Report: {}", path.display()));
    }
}

fn print_suite(suite: &SuiteResult) {
    let rows: Vec<RunRow> = suite.reports.iter().map(RunRow::from).collect();
    output::print_list(&rows, OutputFormat::Table);

    for aborted in &suite.aborted {
        output::print_error(&format!("{}: {}", aborted.scenario, aborted.error));
    }

    let summary = format!(
        "{} passed, {} failed of {} ({} ms)",
        suite.passed, suite.failed, suite.total, suite.duration_ms
    );
    if suite.failed == 0 {
        output::print_success(&summary);
    } else {
        output::print_error(&summary);
    }
}
