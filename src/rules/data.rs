//! Data-access rules over Supabase queries and the paths that reach them.

use std::collections::BTreeSet;

use super::{Finding, Rule, Severity};
use crate::graph::{
    AppGraph, EdgeKind, EndpointNode, GraphNode, MigrationNode, QueryOperation, SupabaseQueryNode,
};

/// Tables a query writes to that are not protected by RLS.
fn unprotected_tables<'g>(graph: &'g AppGraph, query: &SupabaseQueryNode) -> Vec<&'g MigrationNode> {
    graph
        .successors(&query.id, EdgeKind::Touches)
        .into_iter()
        .filter_map(|n| match n {
            GraphNode::Migration(m) if m.table.is_some() && m.rls_enabled != Some(true) => Some(m),
            _ => None,
        })
        .collect()
}

fn location(file: &str, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{}", file, line),
        None => file.to_string(),
    }
}

/// A `select("*")` with nothing bounding the result size.
pub struct UnboundedSelect;

impl Rule for UnboundedSelect {
    fn id(&self) -> &'static str {
        "unbounded-select"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Select of every column with no pagination"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .queries()
            .filter(|q| {
                q.operation == QueryOperation::Select
                    && q.select_all == Some(true)
                    && q.has_pagination == Some(false)
                    && q.is_single_row != Some(true)
                    && q.is_count_only != Some(true)
            })
            .map(|q| {
                self.finding(
                    format!(
                        "unbounded select(\"*\") on \"{}\" at {}; add .range() or .limit()",
                        q.table,
                        location(&q.file_path, q.line)
                    ),
                    vec![q.id.clone()],
                )
            })
            .collect()
    }
}

/// A browser-side write to a table without RLS.
pub struct ClientMutation;

impl Rule for ClientMutation {
    fn id(&self) -> &'static str {
        "client-mutation"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Client code writes to a table without row-level security"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        let mut findings = Vec::new();
        for query in graph.queries().filter(|q| q.is_client && q.operation.is_mutation()) {
            for table in unprotected_tables(graph, query) {
                findings.push(self.finding(
                    format!(
                        "client code at {} runs {} on \"{}\", which has no row-level security",
                        location(&query.file_path, query.line),
                        query.operation.as_str(),
                        query.table
                    ),
                    vec![query.id.clone(), table.id.clone()],
                ));
            }
        }
        findings
    }
}

/// A UI action whose handler ends in a write to a table without RLS.
///
/// Paths are `UiAction -calls-> Endpoint` or
/// `UiAction -triggers-> Callsite -targets-> Endpoint`, then
/// `-queries-> mutation -touches-> Migration`. One finding is reported per
/// action and table, using the first path found.
pub struct UiWritesUnprotectedTable;

impl UiWritesUnprotectedTable {
    fn reachable_endpoints<'g>(graph: &'g AppGraph, ui_id: &str) -> Vec<&'g EndpointNode> {
        let direct = graph.successors(ui_id, EdgeKind::Calls);
        let via_callsites = graph
            .successors(ui_id, EdgeKind::Triggers)
            .into_iter()
            .flat_map(|c| graph.successors(c.id(), EdgeKind::Targets));

        direct
            .into_iter()
            .chain(via_callsites)
            .filter_map(|n| match n {
                GraphNode::Endpoint(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

impl Rule for UiWritesUnprotectedTable {
    fn id(&self) -> &'static str {
        "ui-writes-unprotected-table"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "UI action writes through an endpoint to a table without row-level security"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        let mut findings = Vec::new();
        for ui in graph.ui_actions() {
            let mut seen = BTreeSet::new();
            for endpoint in Self::reachable_endpoints(graph, &ui.id) {
                let queries = graph
                    .successors(&endpoint.id, EdgeKind::Queries)
                    .into_iter()
                    .filter_map(|n| match n {
                        GraphNode::SupabaseQuery(q) if q.operation.is_mutation() => Some(q),
                        _ => None,
                    });
                for query in queries {
                    for table in unprotected_tables(graph, query) {
                        if !seen.insert(table.id.as_str()) {
                            continue;
                        }
                        let label = ui.label.as_deref().unwrap_or(&ui.element);
                        findings.push(self.finding(
                            format!(
                                "\"{}\" at {} reaches {} which runs {} on \"{}\" without row-level security",
                                label,
                                location(&ui.file_path, ui.line),
                                endpoint.path_or_name,
                                query.operation.as_str(),
                                query.table
                            ),
                            vec![
                                ui.id.clone(),
                                endpoint.id.clone(),
                                query.id.clone(),
                                table.id.clone(),
                            ],
                        ));
                    }
                }
            }
        }
        findings
    }
}
