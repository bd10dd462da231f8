//! Rule engine.
//!
//! Rules are pure functions of the linked graph. An absent optional field
//! is read as unknown rather than false. Only `missing-rls` fires on an
//! unknown fact, since a table with no recorded RLS state is unprotected.

mod data;
mod env;
mod schema;
mod types;
mod ui;

pub use data::{ClientMutation, UiWritesUnprotectedTable, UnboundedSelect};
pub use env::{EnvUndocumented, SecretInClientBoundary};
pub use schema::{DestructiveMigration, MissingRls, RlsNoPolicies};
pub use types::{fingerprint, sort_findings, Finding, Severity};
pub use ui::{DanglingApiCall, DeadNavigation, StubUiAction};

use tracing::debug;

use crate::graph::AppGraph;

/// A check over the application graph.
pub trait Rule: Send + Sync {
    /// Stable rule id, e.g. `missing-rls`.
    fn id(&self) -> &'static str;

    fn severity(&self) -> Severity;

    /// One-line description for `readycheck rules`.
    fn description(&self) -> &'static str;

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding>;

    /// Build a finding for this rule.
    fn finding(&self, message: String, node_refs: Vec<String>) -> Finding {
        Finding::new(self.id(), self.severity(), message, node_refs)
    }
}

/// Ordered collection of rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in catalog.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MissingRls));
        registry.register(Box::new(RlsNoPolicies));
        registry.register(Box::new(UnboundedSelect));
        registry.register(Box::new(StubUiAction));
        registry.register(Box::new(SecretInClientBoundary));
        registry.register(Box::new(EnvUndocumented));
        registry.register(Box::new(DestructiveMigration));
        registry.register(Box::new(DanglingApiCall));
        registry.register(Box::new(DeadNavigation));
        registry.register(Box::new(UiWritesUnprotectedTable));
        registry.register(Box::new(ClientMutation));
        registry
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Run every enabled rule once and return the findings in canonical
    /// order.
    pub fn run<F>(&self, graph: &AppGraph, is_enabled: F) -> Vec<Finding>
    where
        F: Fn(&str) -> bool,
    {
        let mut findings = Vec::new();
        for rule in self.rules.iter().filter(|r| is_enabled(r.id())) {
            let found = rule.evaluate(graph);
            debug!(rule = rule.id(), findings = found.len(), "rule evaluated");
            findings.extend(found);
        }
        sort_findings(&mut findings);
        findings
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;

    #[test]
    fn test_default_catalog() {
        let registry = RuleRegistry::with_defaults();
        let ids: Vec<_> = registry.rules().iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 11);
        assert!(ids.contains(&"missing-rls"));
        assert!(ids.contains(&"ui-writes-unprotected-table"));

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_run_sorts_and_filters() {
        let mut graph = AppGraph::new();
        graph.add_node(fixtures::table("orders", Some(false), Some(0)));
        graph.add_node(fixtures::table("audit", Some(true), Some(0)));
        graph.add_node(fixtures::env("lib/env.ts", "TOKEN", false, Some(false)));

        let registry = RuleRegistry::with_defaults();
        let findings = registry.run(&graph, |_| true);
        let ids: Vec<_> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["missing-rls", "rls-no-policies", "env-undocumented"]);

        let findings = registry.run(&graph, |id| id != "missing-rls");
        assert!(findings.iter().all(|f| f.rule_id != "missing-rls"));
    }

    #[test]
    fn test_rule_order_does_not_matter() {
        let mut graph = AppGraph::new();
        graph.add_node(fixtures::table("a", Some(false), None));
        graph.add_node(fixtures::table("b", Some(true), Some(0)));
        graph.add_node(GraphNode::SupabaseQuery(fixtures::query(
            "lib/db.ts",
            3,
            "a",
            crate::graph::QueryOperation::Select,
        )));

        let forward = RuleRegistry::with_defaults().run(&graph, |_| true);

        let mut reversed = RuleRegistry::new();
        reversed.register(Box::new(RlsNoPolicies));
        reversed.register(Box::new(MissingRls));
        let mut expected = forward.clone();
        expected.retain(|f| f.rule_id == "missing-rls" || f.rule_id == "rls-no-policies");
        assert_eq!(reversed.run(&graph, |_| true), expected);
    }
}
