//! Sprite-sheet manifest check

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use scenecheck_assets::manifest::{DEFAULT_ASSETS_ROOT, DEFAULT_MANIFEST, DEFAULT_SPOTLIGHT};
use scenecheck_assets::{ManifestValidator, Spotlight, ValidationReport};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ValidateAssetsArgs {
    /// Manifest file mapping asset paths to sheet configuration
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Directory the manifest keys are relative to
    #[arg(long, default_value = DEFAULT_ASSETS_ROOT)]
    pub assets_root: PathBuf,

    /// Manifest entry whose configuration is echoed
    #[arg(long, default_value = DEFAULT_SPOTLIGHT)]
    pub spotlight: String,

    /// Do not echo any entry
    #[arg(long, conflicts_with = "spotlight")]
    pub no_spotlight: bool,
}

pub fn execute(args: ValidateAssetsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let validator = ManifestValidator::new(&args.manifest, &args.assets_root);
    let spotlight = (!args.no_spotlight).then_some(args.spotlight.as_str());

    let report = match validator.validate(spotlight) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    match format {
        OutputFormat::Table => print_summary(&report),
        _ => output::print_document(&report, format),
    }

    if !report.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &ValidationReport) {
    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!("{}", " Asset Manifest Check".bold());
    println!("{}", "━".repeat(60).dimmed());
    println!();
    println!("{}  {}", "📋 Manifest:".bold(), report.manifest.display());
    println!("{}  {}", "📂 Assets:".bold(), report.assets_root.display());
    println!();

    println!(
        "   Entries: {}   Missing: {}",
        report.total_entries,
        if report.is_complete() {
            report.missing_count().to_string().green()
        } else {
            report.missing_count().to_string().red()
        }
    );
    for key in &report.missing {
        println!("     • {}", key.red());
    }
    println!();

    match &report.spotlight {
        Spotlight::NotRequested => {}
        Spotlight::Present { key, pretty, .. } => {
            println!("{} {}", "🔎 Spotlight:".bold(), key.cyan());
            for line in pretty.lines() {
                println!("   {}", line);
            }
            println!();
        }
        Spotlight::Absent { key } => {
            output::print_warning(&format!("'{}' is not in the manifest", key));
            println!();
        }
    }

    if report.is_complete() {
        output::print_success("All manifest entries exist on disk");
    } else {
        output::print_error(&format!("{} manifest entries have no file", report.missing_count()));
    }
}
