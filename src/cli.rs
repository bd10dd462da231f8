//! Command-line interface for readycheck.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use crate::baseline::{Baseline, BASELINE_FILE};
use crate::config::{Config, TEMPLATE};
use crate::report::{self, OutputFormat};
use crate::rules::{RuleRegistry, Severity};
use crate::scan::Scanner;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Production-readiness gate for Next.js + Supabase apps.
///
/// Readycheck maps pages, UI actions, endpoints, data queries, migrations
/// and environment variables into one graph, then checks it for missing
/// row-level security, unbounded queries, stub handlers and leaked secrets.
#[derive(Parser)]
#[command(name = "readycheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a project and write the validation context
    #[command(visible_alias = "check")]
    Scan(ScanArgs),
    /// Accept the current findings into the baseline file
    Baseline(BaselineArgs),
    /// List the rule catalog
    Rules,
    /// Write a default readycheck.yaml
    Init(InitArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Report directory (default: output_dir from config, or .readycheck)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Report formats, comma separated: json, md
    #[arg(short, long, value_delimiter = ',', default_values = ["json", "md"])]
    pub format: Vec<OutputFormat>,

    /// Lowest severity that fails the gate: LOW, MEDIUM, HIGH or CRITICAL
    #[arg(long)]
    pub fail_on: Option<Severity>,

    /// Path to config file (default: readycheck.yaml in the project root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Baseline file (default: validation-baseline.json in the project root)
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Only print the gate result
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the baseline command.
#[derive(Parser)]
pub struct BaselineArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Baseline file to write (default: validation-baseline.json in the project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reason recorded on new entries
    #[arg(short, long)]
    pub reason: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "readycheck.yaml")]
    pub output: PathBuf,
}

/// Dispatch a parsed command line. Returns the process exit code.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Baseline(args) => run_baseline(args),
        Commands::Rules => run_rules(),
        Commands::Init(args) => run_init(args),
    }
}

/// Resolve a possibly relative path against the project root.
fn under_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    let mut scanner = Scanner::new(&args.path);
    if let Some(config) = &args.config {
        scanner = scanner.config_path(config);
    }
    if let Some(fail_on) = args.fail_on {
        scanner = scanner.fail_on(fail_on);
    }
    if let Some(baseline) = &args.baseline {
        scanner = scanner.baseline_path(baseline);
    }

    let outcome = scanner
        .run()
        .with_context(|| format!("scanning {}", args.path.display()))?;

    let root = PathBuf::from(&outcome.context.project_root);
    let out_dir = match &args.out {
        Some(out) => out.clone(),
        None => under_root(&root, Path::new(outcome.config.output_dir())),
    };
    let written = report::write_reports(&outcome.context, &out_dir, &args.format)?;

    if !args.quiet {
        report::print_summary(&outcome.context, &written);
    }

    if outcome.passed() {
        Ok(EXIT_SUCCESS)
    } else {
        eprintln!(
            "readycheck: gate failed: {} blocking finding(s) at or above {}",
            outcome.context.blocking_count, outcome.context.fail_on
        );
        Ok(EXIT_FAILED)
    }
}

/// Run the baseline command.
pub fn run_baseline(args: &BaselineArgs) -> anyhow::Result<i32> {
    let mut scanner = Scanner::new(&args.path);
    if let Some(config) = &args.config {
        scanner = scanner.config_path(config);
    }
    let output = match &args.output {
        Some(p) => p.clone(),
        None => args.path.join(BASELINE_FILE),
    };
    // Entries are rebuilt from scratch; the previous file only donates reasons
    let previous = Baseline::load(&output);
    let outcome = scanner
        .baseline_path(&output)
        .run()
        .with_context(|| format!("scanning {}", args.path.display()))?;

    let baseline = Baseline::from_findings(&outcome.findings, &previous, args.reason.as_deref());
    baseline
        .save(&output)
        .with_context(|| format!("writing baseline {}", output.display()))?;

    println!(
        "Wrote {} with {} entr{}",
        output.display(),
        baseline.len(),
        if baseline.len() == 1 { "y" } else { "ies" }
    );
    Ok(EXIT_SUCCESS)
}

/// Run the rules command.
pub fn run_rules() -> anyhow::Result<i32> {
    let registry = RuleRegistry::with_defaults();
    let mut rules: Vec<_> = registry.rules().iter().collect();
    rules.sort_by(|a, b| b.severity().cmp(&a.severity()).then(a.id().cmp(b.id())));

    println!("Rules:");
    println!();
    for rule in rules {
        let severity = match rule.severity() {
            Severity::Critical => rule.severity().as_str().red().bold(),
            Severity::High => rule.severity().as_str().red(),
            Severity::Medium => rule.severity().as_str().yellow(),
            Severity::Low => rule.severity().as_str().blue(),
        };
        println!("  {:<30} {:<10} {}", rule.id(), severity, rule.description());
    }
    println!();
    println!("Disable a rule with `disabled_rules` in readycheck.yaml.");
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    // Never write a template the scanner would reject
    let _: Config = serde_yaml::from_str(TEMPLATE).context("built-in template is invalid")?;
    std::fs::write(&args.output, TEMPLATE)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: readycheck scan .");

    Ok(EXIT_SUCCESS)
}
