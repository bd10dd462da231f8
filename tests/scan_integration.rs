//! End-to-end scans of the fixture app in `testdata/app`.
//!
//! Every scan runs on a temporary copy, so tests can add files and write
//! baselines without touching the fixture.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use readycheck::graph::{EdgeKind, NodeKind};
use readycheck::{Baseline, BaselineEntry, ScanOutcome, Scanner, Severity};
use tempfile::TempDir;
use walkdir::WalkDir;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("app")
}

/// Copy the fixture app into a fresh temporary directory.
fn fixture_copy() -> TempDir {
    let temp = TempDir::new().expect("create temp dir");
    let src = fixture_path();
    for entry in WalkDir::new(&src) {
        let entry = entry.expect("walk fixture");
        let rel = entry.path().strip_prefix(&src).unwrap();
        let dest = temp.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).unwrap();
        } else {
            fs::copy(entry.path(), &dest).unwrap();
        }
    }
    temp
}

fn scan(root: &Path) -> ScanOutcome {
    Scanner::new(root).run().expect("scan should succeed")
}

fn rule_hits<'a>(outcome: &'a ScanOutcome, rule: &str) -> Vec<&'a readycheck::Finding> {
    outcome.findings.iter().filter(|f| f.rule_id == rule).collect()
}

#[test]
fn test_fixture_graph_shape() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());
    let graph = &outcome.graph;

    assert_eq!(outcome.context.summary.migration_files, 1);
    assert_eq!(graph.count_of_kind(NodeKind::Route), 4);
    assert!(graph.node("route:/checkout").is_some());
    assert!(graph.node("route:/api/orders").is_some());
    assert!(graph.node("endpoint:/api/orders:POST").is_some());
    assert!(graph.node("migration:orders").is_some());
    assert!(graph.node("migration:users").is_some());

    let fetch = "callsite:app/checkout/page.tsx:7:11:fetch:/api/orders";
    let targets: Vec<_> = graph
        .successors(fetch, EdgeKind::Targets)
        .iter()
        .map(|n| n.id().to_string())
        .collect();
    assert_eq!(targets, vec!["endpoint:/api/orders:POST".to_string()]);

    let place_order = "ui_action:app/checkout/page.tsx:16:7:button";
    assert!(graph.has_outgoing(place_order, EdgeKind::Triggers));
    assert!(graph.has_outgoing("route:/checkout", EdgeKind::Renders));
}

#[test]
fn test_missing_rls_on_orders() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let hits = rule_hits(&outcome, "missing-rls");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].severity, Severity::Critical);
    assert_eq!(hits[0].node_refs, vec!["migration:orders".to_string()]);
    // users has RLS and a policy
    assert!(rule_hits(&outcome, "rls-no-policies").is_empty());
}

#[test]
fn test_unbounded_select_on_users() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let hits = rule_hits(&outcome, "unbounded-select");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].severity, Severity::Medium);
    assert_eq!(
        hits[0].primary_ref(),
        Some("supabase_query:app/users/page.tsx:4:42:users:select")
    );
}

#[test]
fn test_console_only_button() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let hits = rule_hits(&outcome, "stub-ui-action");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].primary_ref(), Some("ui_action:app/checkout/page.tsx:15:7:button"));
    assert!(hits[0].message.contains("\"Pay now\""));
    assert!(hits[0].message.contains("console-only"));
}

#[test]
fn test_secret_in_client_file() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let secret = "env_var:app/checkout/page.tsx:STRIPE_SECRET_KEY";
    let hits = rule_hits(&outcome, "secret-in-client-boundary");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].primary_ref(), Some(secret));

    // Not in .env.example either
    let undocumented = rule_hits(&outcome, "env-undocumented");
    assert_eq!(undocumented.len(), 1);
    assert_eq!(undocumented[0].primary_ref(), Some(secret));
}

#[test]
fn test_ui_write_path_to_unprotected_table() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let hits = rule_hits(&outcome, "ui-writes-unprotected-table");
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].node_refs,
        vec![
            "ui_action:app/checkout/page.tsx:16:7:button".to_string(),
            "endpoint:/api/orders:POST".to_string(),
            "supabase_query:app/api/orders/route.ts:6:42:orders:insert".to_string(),
            "migration:orders".to_string(),
        ]
    );
    // The write happens on the server
    assert!(rule_hits(&outcome, "client-mutation").is_empty());
    assert!(rule_hits(&outcome, "dangling-api-call").is_empty());
}

#[test]
fn test_dead_link() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());

    let hits = rule_hits(&outcome, "dead-navigation");
    assert_eq!(hits.len(), 1);
    assert!(hits[0].message.contains("/pricing"));
}

#[test]
fn test_default_gate_fails_then_baseline_passes() {
    let temp = fixture_copy();
    let outcome = scan(temp.path());
    assert!(!outcome.passed());
    assert_eq!(outcome.context.fail_on, Severity::Critical);
    assert_eq!(outcome.context.blocking_count, 2);

    let criticals: Vec<BaselineEntry> = outcome
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .map(|f| BaselineEntry::new(f.fingerprint.clone()))
        .collect();
    let baseline_path = temp.path().join("validation-baseline.json");
    Baseline::from_entries(criticals).save(&baseline_path).unwrap();

    let again = scan(temp.path());
    assert!(again.passed());
    assert_eq!(again.context.blocking_count, 0);
    assert_eq!(again.context.summary.suppressed_count, 2);
    // Suppressed findings are still reported
    assert_eq!(again.findings.len(), outcome.findings.len());
    assert!(again
        .context
        .findings
        .iter()
        .filter(|f| f.suppressed)
        .all(|f| f.severity == Severity::Critical));
}

#[test]
fn test_scans_are_deterministic() {
    let temp = fixture_copy();
    let first = scan(temp.path());
    let second = scan(temp.path());

    assert_eq!(first.findings, second.findings);
    assert_eq!(first.context.findings, second.context.findings);
    assert_eq!(first.context.summary, second.context.summary);
    assert_eq!(first.graph.edges(), second.graph.edges());
    let ids = |o: &ScanOutcome| o.graph.nodes().map(|n| n.id().to_string()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn test_threshold_is_monotonic() {
    let temp = fixture_copy();
    let mut previous = usize::MAX;
    for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
        let outcome = Scanner::new(temp.path()).fail_on(severity).run().unwrap();
        let blocking = outcome.context.blocking_count;
        assert!(blocking <= previous, "{} blocked more than a lower threshold", severity);
        assert_eq!(
            blocking,
            outcome.findings.iter().filter(|f| f.severity >= severity).count()
        );
        previous = blocking;
    }
}

#[test]
fn test_ids_stable_under_unrelated_edits() {
    let temp = fixture_copy();
    let before: BTreeSet<String> = scan(temp.path())
        .findings
        .into_iter()
        .map(|f| f.fingerprint)
        .collect();

    fs::write(
        temp.path().join("lib").join("format.ts"),
        "export function formatPrice(cents: number) {\n  return `$${(cents / 100).toFixed(2)}`;\n}\n",
    )
    .unwrap();
    // Shifts every query position in the route handler down one line
    let route = temp.path().join("app/api/orders/route.ts");
    let content = fs::read_to_string(&route).unwrap();
    fs::write(&route, format!("// Orders are created by the checkout page.\n{}", content)).unwrap();

    let outcome = scan(temp.path());
    assert!(outcome
        .graph
        .node("supabase_query:app/api/orders/route.ts:7:42:orders:insert")
        .is_some());
    let after: BTreeSet<String> = outcome.findings.into_iter().map(|f| f.fingerprint).collect();
    assert_eq!(before, after);
}

#[test]
fn test_baseline_survives_edits_in_other_files() {
    let temp = fixture_copy();
    let first = scan(temp.path());
    let write_path = rule_hits(&first, "ui-writes-unprotected-table")[0].clone();
    Baseline::from_entries(vec![BaselineEntry::new(write_path.fingerprint.clone())])
        .save(&temp.path().join("validation-baseline.json"))
        .unwrap();

    let route = temp.path().join("app/api/orders/route.ts");
    let content = fs::read_to_string(&route).unwrap();
    fs::write(&route, format!("// header\n{}", content)).unwrap();

    let again = scan(temp.path());
    let hit = again
        .context
        .findings
        .iter()
        .find(|f| f.rule_id == "ui-writes-unprotected-table")
        .unwrap();
    assert_eq!(hit.node_refs[2], "supabase_query:app/api/orders/route.ts:7:42:orders:insert");
    assert_eq!(hit.fingerprint, write_path.fingerprint);
    assert!(hit.suppressed);
}

#[test]
fn test_node_modules_are_ignored() {
    let temp = fixture_copy();
    let vendored = temp.path().join("node_modules").join("ui-kit");
    fs::create_dir_all(&vendored).unwrap();
    fs::write(
        vendored.join("index.tsx"),
        "export const Buy = () => <button onClick={() => {}}>Buy</button>;\nconst k = process.env.VENDOR_SECRET;\n",
    )
    .unwrap();

    let outcome = scan(temp.path());
    assert!(outcome
        .graph
        .nodes()
        .all(|n| !n.file_path().starts_with("node_modules")));
    assert_eq!(rule_hits(&outcome, "stub-ui-action").len(), 1);
}

#[test]
fn test_disabled_rule_in_config() {
    let temp = fixture_copy();
    fs::write(
        temp.path().join("readycheck.yaml"),
        "disabled_rules:\n  - missing-rls\n  - secret-in-client-boundary\n",
    )
    .unwrap();

    let outcome = scan(temp.path());
    assert!(outcome.passed());
    assert!(rule_hits(&outcome, "missing-rls").is_empty());
    assert!(!rule_hits(&outcome, "unbounded-select").is_empty());
}
