//! Validation-context reports.
//!
//! Two renderings of the same `ValidationContext`:
//! - JSON: `validation-context.json`, camelCase, for CI and tooling
//! - Markdown: `validation-context.md`, for humans and PR comments
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed write never leaves a partial report behind.

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::graph::{AppGraph, NodeKind};
use crate::rules::{Finding, Severity};

/// Version of the JSON layout below.
pub const SCHEMA_VERSION: u32 = 1;

pub const TOOL_NAME: &str = "readycheck";

pub const JSON_REPORT: &str = "validation-context.json";
pub const MARKDOWN_REPORT: &str = "validation-context.md";

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputFormat::Json => JSON_REPORT,
            OutputFormat::Markdown => MARKDOWN_REPORT,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown format {:?} (expected json or md)", other)),
        }
    }
}

/// Aggregate numbers for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files_scanned: usize,
    pub migration_files: usize,
    /// Every node kind, zero counts included.
    pub node_counts: BTreeMap<NodeKind, usize>,
    pub edge_count: usize,
    /// Every severity, zero counts included. Suppressed findings count.
    pub finding_counts: BTreeMap<Severity, usize>,
    pub suppressed_count: usize,
}

/// A finding as it appears in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub node_refs: Vec<String>,
    pub fingerprint: String,
    pub suppressed: bool,
    /// Source file of the primary node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl ReportFinding {
    /// Attach location and suppression state to a finding.
    pub fn from_finding(finding: &Finding, graph: &AppGraph, suppressed: bool) -> Self {
        let primary = finding.primary_ref().and_then(|id| graph.node(id));
        Self {
            rule_id: finding.rule_id.clone(),
            severity: finding.severity,
            message: finding.message.clone(),
            node_refs: finding.node_refs.clone(),
            fingerprint: finding.fingerprint.clone(),
            suppressed,
            file: primary.map(|n| n.file_path().to_string()),
            line: primary.and_then(|n| n.line()),
        }
    }

    /// Whether this finding fails a gate at the given threshold.
    pub fn is_blocking(&self, fail_on: Severity) -> bool {
        !self.suppressed && self.severity.meets(fail_on)
    }

    fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match self.line {
            Some(line) => format!("{}:{}", file, line),
            None => file.to_string(),
        })
    }
}

/// The full result of a scan; the only artifact that outlives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationContext {
    pub schema_version: u32,
    pub tool: String,
    pub tool_version: String,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub project_root: String,
    pub fail_on: Severity,
    pub passed: bool,
    pub blocking_count: usize,
    pub summary: Summary,
    pub findings: Vec<ReportFinding>,
}

impl ValidationContext {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Count findings per severity, including severities with none.
pub fn severity_counts(findings: &[ReportFinding]) -> BTreeMap<Severity, usize> {
    let mut counts: BTreeMap<Severity, usize> =
        Severity::DESCENDING.iter().map(|s| (*s, 0)).collect();
    for finding in findings {
        *counts.entry(finding.severity).or_default() += 1;
    }
    counts
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn write_report(path: &Path, content: &str) -> Result<(), ScanError> {
    write_atomic(path, content.as_bytes()).map_err(|source| ScanError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `validation-context.json`.
pub fn write_json(ctx: &ValidationContext, path: &Path) -> Result<(), ScanError> {
    let json = ctx.to_json().map_err(|e| ScanError::ReportWrite {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    write_report(path, &format!("{}\n", json))
}

/// Write `validation-context.md`.
pub fn write_markdown(ctx: &ValidationContext, path: &Path) -> Result<(), ScanError> {
    write_report(path, &render_markdown(ctx))
}

/// Write every requested format into `out_dir`, creating it if needed.
/// Returns the written paths in format order.
pub fn write_reports(
    ctx: &ValidationContext,
    out_dir: &Path,
    formats: &[OutputFormat],
) -> Result<Vec<PathBuf>, ScanError> {
    fs::create_dir_all(out_dir).map_err(|source| ScanError::ReportWrite {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for format in formats {
        let path = out_dir.join(format.file_name());
        if written.contains(&path) {
            continue;
        }
        match format {
            OutputFormat::Json => write_json(ctx, &path)?,
            OutputFormat::Markdown => write_markdown(ctx, &path)?,
        }
        tracing::debug!(path = %path.display(), "wrote report");
        written.push(path);
    }
    Ok(written)
}

/// Render the Markdown report.
pub fn render_markdown(ctx: &ValidationContext) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Validation context");
    let _ = writeln!(md);
    let status = if ctx.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(
        md,
        "**Gate: {}** (fail on {}, {} blocking)",
        status, ctx.fail_on, ctx.blocking_count
    );
    let _ = writeln!(md);
    let _ = writeln!(md, "- Project: `{}`", ctx.project_root);
    let _ = writeln!(md, "- Generated: {} by {} {}", ctx.generated_at, ctx.tool, ctx.tool_version);
    let _ = writeln!(md);

    let s = &ctx.summary;
    let _ = writeln!(md, "## Summary");
    let _ = writeln!(md);
    let _ = writeln!(md, "| Metric | Count |");
    let _ = writeln!(md, "|---|---:|");
    let _ = writeln!(md, "| Files scanned | {} |", s.files_scanned);
    let _ = writeln!(md, "| Migration files | {} |", s.migration_files);
    for (kind, count) in &s.node_counts {
        let _ = writeln!(md, "| Nodes: {} | {} |", kind, count);
    }
    let _ = writeln!(md, "| Edges | {} |", s.edge_count);
    for severity in Severity::DESCENDING {
        let count = s.finding_counts.get(&severity).copied().unwrap_or(0);
        let _ = writeln!(md, "| Findings: {} | {} |", severity, count);
    }
    let _ = writeln!(md, "| Suppressed | {} |", s.suppressed_count);
    let _ = writeln!(md);

    let _ = writeln!(md, "## Findings");
    let _ = writeln!(md);
    if ctx.findings.is_empty() {
        let _ = writeln!(md, "No findings.");
        return md;
    }

    for severity in Severity::DESCENDING {
        let group: Vec<&ReportFinding> = ctx
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(md, "### {} ({})", severity, group.len());
        let _ = writeln!(md);
        for f in group {
            let mut line = format!("- `{}` {}", f.rule_id, f.message);
            if let Some(loc) = f.location() {
                let _ = write!(line, " (`{}`)", loc);
            }
            if f.suppressed {
                line.push_str(" _(suppressed)_");
            }
            let _ = writeln!(md, "{}", line);
        }
        let _ = writeln!(md);
    }
    md
}

/// Print a short colored summary to stdout.
pub fn print_summary(ctx: &ValidationContext, written: &[PathBuf]) {
    println!();
    print!("  {}", TOOL_NAME.cyan().bold());
    println!(" v{}", ctx.tool_version);
    println!();
    print!("  {}", "Scanning: ".dimmed());
    println!("{}", ctx.project_root);
    println!();

    for f in ctx.findings.iter().filter(|f| !f.suppressed) {
        print_severity_tag(f.severity);
        print!("   {:<28}", f.rule_id.dimmed());
        if let Some(loc) = f.location() {
            print!("{}", loc.blue());
        }
        println!();
        println!("             {}", f.message);
    }
    if ctx.findings.iter().any(|f| !f.suppressed) {
        println!();
    }

    let counts = &ctx.summary.finding_counts;
    let parts: Vec<String> = Severity::DESCENDING
        .iter()
        .map(|s| format!("{} {}", counts.get(s).copied().unwrap_or(0), s))
        .collect();
    print!("  Findings: {}", parts.join(", "));
    if ctx.summary.suppressed_count > 0 {
        print!(
            "  {}",
            format!("({} suppressed)", ctx.summary.suppressed_count).dimmed()
        );
    }
    println!();

    for path in written {
        println!("  {}{}", "Report: ".dimmed(), path.display());
    }
    println!();

    if ctx.passed {
        println!("  {}", "✓ PASS".green());
    } else {
        println!(
            "  {}  {} blocking finding(s) at or above {}",
            "✗ FAIL".red(),
            ctx.blocking_count,
            ctx.fail_on
        );
    }
    println!();
}

fn print_severity_tag(severity: Severity) {
    match severity {
        Severity::Critical => print!("    {}", "CRITICAL".red().bold()),
        Severity::High => print!("    {}", "HIGH    ".red()),
        Severity::Medium => print!("    {}", "MEDIUM  ".yellow()),
        Severity::Low => print!("    {}", "LOW     ".blue()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn finding(rule: &str, severity: Severity, suppressed: bool) -> ReportFinding {
        ReportFinding {
            rule_id: rule.to_string(),
            severity,
            message: format!("{} message", rule),
            node_refs: vec![format!("migration:{}", rule)],
            fingerprint: "0123456789abcdef".to_string(),
            suppressed,
            file: Some("supabase/migrations/001_init.sql".to_string()),
            line: None,
        }
    }

    fn context(findings: Vec<ReportFinding>) -> ValidationContext {
        let fail_on = Severity::Critical;
        let blocking_count = findings.iter().filter(|f| f.is_blocking(fail_on)).count();
        ValidationContext {
            schema_version: SCHEMA_VERSION,
            tool: TOOL_NAME.to_string(),
            tool_version: "0.1.0".to_string(),
            generated_at: "2024-05-01T12:00:00+00:00".to_string(),
            project_root: "/work/app".to_string(),
            fail_on,
            passed: blocking_count == 0,
            blocking_count,
            summary: Summary {
                files_scanned: 3,
                migration_files: 1,
                node_counts: NodeKind::ALL.iter().map(|k| (*k, 0)).collect(),
                edge_count: 0,
                finding_counts: severity_counts(&findings),
                suppressed_count: findings.iter().filter(|f| f.suppressed).count(),
            },
            findings,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("markdown".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_json_shape() {
        let ctx = context(vec![finding("missing-rls", Severity::Critical, false)]);
        let value: serde_json::Value = serde_json::from_str(&ctx.to_json().unwrap()).unwrap();

        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["failOn"], "CRITICAL");
        assert_eq!(value["passed"], false);
        assert_eq!(value["blockingCount"], 1);
        assert_eq!(value["summary"]["nodeCounts"]["supabase_query"], 0);
        assert_eq!(value["summary"]["findingCounts"]["LOW"], 0);
        assert_eq!(value["summary"]["findingCounts"]["CRITICAL"], 1);
        assert_eq!(value["findings"][0]["ruleId"], "missing-rls");
        assert_eq!(value["findings"][0]["nodeRefs"][0], "migration:missing-rls");
        assert!(value["findings"][0].get("line").is_none());

        let back: ValidationContext = serde_json::from_value(value).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_markdown_groups_by_severity() {
        let ctx = context(vec![
            finding("missing-rls", Severity::Critical, true),
            finding("unbounded-select", Severity::Medium, false),
            finding("env-undocumented", Severity::Low, false),
        ]);
        let md = render_markdown(&ctx);

        assert!(md.contains("**Gate: PASSED**"));
        let critical = md.find("### CRITICAL (1)").unwrap();
        let medium = md.find("### MEDIUM (1)").unwrap();
        let low = md.find("### LOW (1)").unwrap();
        assert!(critical < medium && medium < low);
        assert!(!md.contains("### HIGH"));
        assert!(md.contains("`missing-rls` missing-rls message (`supabase/migrations/001_init.sql`) _(suppressed)_"));
    }

    #[test]
    fn test_write_reports_atomically() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested").join(".readycheck");
        let ctx = context(Vec::new());

        let written =
            write_reports(&ctx, &out, &[OutputFormat::Json, OutputFormat::Markdown, OutputFormat::Json])
                .unwrap();
        assert_eq!(written, vec![out.join(JSON_REPORT), out.join(MARKDOWN_REPORT)]);

        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));

        let json = fs::read_to_string(out.join(JSON_REPORT)).unwrap();
        let parsed: ValidationContext = serde_json::from_str(&json).unwrap();
        assert!(parsed.passed);
    }

    #[test]
    fn test_write_to_unwritable_location_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = write_reports(&context(Vec::new()), &blocker.join("out"), &[OutputFormat::Json])
            .unwrap_err();
        assert!(matches!(err, ScanError::ReportWrite { .. }));
    }
}
