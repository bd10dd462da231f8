//! Scan orchestration.
//!
//! One scan runs the stages in a fixed order: index, source warm-up,
//! extraction, linking, rules, baseline filter. The result is a
//! `ValidationContext` plus the intermediate graph for callers that need it.

use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::baseline::{Baseline, BASELINE_FILE};
use crate::config::Config;
use crate::error::ScanError;
use crate::extract::{default_extractors, load_env_example, run_pipeline, ExtractContext};
use crate::graph::AppGraph;
use crate::index::{index_project, IndexOptions};
use crate::link::link;
use crate::report::{
    severity_counts, ReportFinding, Summary, ValidationContext, SCHEMA_VERSION, TOOL_NAME,
};
use crate::rules::{Finding, RuleRegistry, Severity};

/// Everything a scan produced.
pub struct ScanOutcome {
    pub context: ValidationContext,
    pub graph: AppGraph,
    /// Every finding, suppressed or not, in report order.
    pub findings: Vec<Finding>,
    /// The baseline that was applied.
    pub baseline: Baseline,
    pub config: Config,
}

impl ScanOutcome {
    pub fn passed(&self) -> bool {
        self.context.passed
    }
}

/// Configures and runs a scan of one project.
pub struct Scanner {
    root: PathBuf,
    config_path: Option<PathBuf>,
    config: Option<Config>,
    fail_on: Option<Severity>,
    baseline_path: Option<PathBuf>,
    registry: Option<RuleRegistry>,
    today: Option<NaiveDate>,
}

impl Scanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config_path: None,
            config: None,
            fail_on: None,
            baseline_path: None,
            registry: None,
            today: None,
        }
    }

    /// Read configuration from this file instead of discovering one.
    pub fn config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use an already loaded configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the gate threshold.
    pub fn fail_on(mut self, severity: Severity) -> Self {
        self.fail_on = Some(severity);
        self
    }

    /// Baseline file (default: `validation-baseline.json` in the root).
    pub fn baseline_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.baseline_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the built-in rule catalog.
    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Date used for baseline expiry.
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Run every stage and assemble the validation context.
    pub fn run(self) -> Result<ScanOutcome, ScanError> {
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => Config::load(&root, self.config_path.as_deref())?,
        };
        let fail_on = self.fail_on.unwrap_or_else(|| config.fail_on());

        let options = IndexOptions::from_config(&config)?;
        let files = index_project(&root, &options)?;
        let files_scanned = files.len();
        let migration_files = files.iter().filter(|f| f.is_migration).count();
        info!(
            root = %root.display(),
            files = files_scanned,
            migrations = migration_files,
            "indexed project"
        );

        let ctx = ExtractContext::new(root.clone(), files)
            .with_env_example(load_env_example(&root, &config.env_example_files()))
            .with_public_prefixes(config.public_prefixes());
        ctx.sources.warm(&ctx.files);
        debug!(parsed = ctx.sources.parsed_count(), "warmed source cache");

        let mut graph = AppGraph::new();
        run_pipeline(&ctx, &mut graph, &default_extractors());
        link(&mut graph);

        let registry = self.registry.unwrap_or_else(RuleRegistry::with_defaults);
        let findings = registry.run(&graph, |id| config.is_rule_enabled(id));

        let baseline_path = self
            .baseline_path
            .unwrap_or_else(|| root.join(BASELINE_FILE));
        let baseline = Baseline::load(&baseline_path);
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());

        let report_findings: Vec<ReportFinding> = findings
            .iter()
            .map(|f| {
                let suppressed = baseline.suppresses(&f.fingerprint, today);
                ReportFinding::from_finding(f, &graph, suppressed)
            })
            .collect();
        let suppressed_count = report_findings.iter().filter(|f| f.suppressed).count();
        let blocking_count = report_findings
            .iter()
            .filter(|f| f.is_blocking(fail_on))
            .count();

        let context = ValidationContext {
            schema_version: SCHEMA_VERSION,
            tool: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            project_root: root.display().to_string(),
            fail_on,
            passed: blocking_count == 0,
            blocking_count,
            summary: Summary {
                files_scanned,
                migration_files,
                node_counts: graph.kind_counts(),
                edge_count: graph.edge_count(),
                finding_counts: severity_counts(&report_findings),
                suppressed_count,
            },
            findings: report_findings,
        };
        info!(
            findings = context.findings.len(),
            suppressed = suppressed_count,
            blocking = blocking_count,
            fail_on = %fail_on,
            "scan complete"
        );

        Ok(ScanOutcome {
            context,
            graph,
            findings,
            baseline,
            config,
        })
    }
}
