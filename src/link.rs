//! Edge construction.
//!
//! Runs once after every extractor has finished and derives all edges from
//! node attributes. Edges are collected first and inserted in a fixed
//! order, so the edge list is identical between runs over the same tree.

use std::collections::HashMap;
use tracing::debug;

use crate::graph::{
    node_id, AppGraph, CallsiteType, EdgeKind, EndpointNode, NodeKind, RouteNode,
    SupabaseQueryNode, UiActionNode,
};
use crate::router::{matches_route, normalize_target};

type Edge = (String, String, EdgeKind);

/// Link the graph's nodes. Returns the number of edges added.
pub fn link(graph: &mut AppGraph) -> usize {
    let edges = collect_edges(graph);
    let mut added = 0;
    for (from, to, kind) in &edges {
        if graph.add_edge(from, to, *kind) {
            added += 1;
        }
    }
    debug!(edges = added, "linked graph");
    added
}

fn collect_edges(graph: &AppGraph) -> Vec<Edge> {
    let pages: Vec<&RouteNode> = graph.routes().filter(|r| r.is_page).collect();
    let api_endpoints: Vec<&EndpointNode> = graph.endpoints().filter(|e| e.is_api_route).collect();
    let mut actions_by_name: HashMap<&str, Vec<&EndpointNode>> = HashMap::new();
    for endpoint in graph.endpoints().filter(|e| e.is_server_action) {
        actions_by_name
            .entry(endpoint.path_or_name.as_str())
            .or_default()
            .push(endpoint);
    }

    let mut edges = Vec::new();

    // Route -> Endpoint
    for route in graph.routes().filter(|r| r.is_api) {
        for endpoint in api_endpoints.iter().filter(|e| e.path_or_name == route.path) {
            edges.push((route.id.clone(), endpoint.id.clone(), EdgeKind::HandledBy));
        }
    }

    for action in graph.ui_actions() {
        // Route -> UiAction
        if let Some(path) = &action.route_path {
            let route = node_id(NodeKind::Route, &[path]);
            edges.push((route, action.id.clone(), EdgeKind::Renders));
        }

        if let Some(target) = action.href.as_deref().and_then(normalize_target) {
            for route in matching_pages(&pages, &target) {
                edges.push((action.id.clone(), route.id.clone(), EdgeKind::Navigates));
            }
            // Forms posting to an API route
            for endpoint in api_endpoints
                .iter()
                .filter(|e| matches_route(&e.path_or_name, &target))
            {
                edges.push((action.id.clone(), endpoint.id.clone(), EdgeKind::Calls));
            }
        }

        if let Some(name) = action.handler_name.as_deref() {
            let local = name.rsplit('.').next().unwrap_or(name);
            for endpoint in actions_by_name.get(local).into_iter().flatten() {
                edges.push((action.id.clone(), endpoint.id.clone(), EdgeKind::Calls));
            }
        }

        for callsite in triggered_callsites(graph, action) {
            edges.push((action.id.clone(), callsite, EdgeKind::Triggers));
        }
    }

    for callsite in graph.callsites() {
        match callsite.call_type {
            CallsiteType::Fetch | CallsiteType::Axios => {
                let Some(target) = callsite.target_path.as_deref().and_then(normalize_target)
                else {
                    continue;
                };
                for endpoint in api_endpoints.iter().filter(|e| {
                    matches_route(&e.path_or_name, &target)
                        && method_compatible(callsite.method.as_deref(), e.method.as_deref())
                }) {
                    edges.push((callsite.id.clone(), endpoint.id.clone(), EdgeKind::Targets));
                }
            }
            CallsiteType::ServerAction => {
                let Some(symbol) = callsite.target_symbol.as_deref() else {
                    continue;
                };
                for endpoint in actions_by_name.get(symbol).into_iter().flatten() {
                    edges.push((callsite.id.clone(), endpoint.id.clone(), EdgeKind::Targets));
                }
            }
            CallsiteType::Router => {
                let Some(target) = callsite.target_path.as_deref().and_then(normalize_target)
                else {
                    continue;
                };
                for route in matching_pages(&pages, &target) {
                    edges.push((callsite.id.clone(), route.id.clone(), EdgeKind::Navigates));
                }
            }
        }
    }

    // Endpoint -> SupabaseQuery
    let mut queries_by_file: HashMap<&str, Vec<&SupabaseQueryNode>> = HashMap::new();
    for query in graph.queries() {
        queries_by_file.entry(query.file_path.as_str()).or_default().push(query);
    }
    for endpoint in graph.endpoints() {
        let Some(queries) = queries_by_file.get(endpoint.file_path.as_str()) else {
            continue;
        };
        for query in queries.iter().filter(|q| within_endpoint(endpoint, q.line)) {
            edges.push((endpoint.id.clone(), query.id.clone(), EdgeKind::Queries));
        }
    }

    // SupabaseQuery -> Migration
    let mut tables: HashMap<&str, &str> = HashMap::new();
    for migration in graph.migrations() {
        if let Some(table) = migration.table.as_deref() {
            tables.insert(table, migration.id.as_str());
        }
    }
    for query in graph.queries() {
        let table = query.table.strip_prefix("public.").unwrap_or(&query.table);
        if let Some(migration) = tables.get(table) {
            edges.push((query.id.clone(), migration.to_string(), EdgeKind::Touches));
        }
    }

    edges
}

/// Page routes a concrete path resolves to. A static route wins over
/// dynamic ones.
fn matching_pages<'a>(pages: &[&'a RouteNode], target: &str) -> Vec<&'a RouteNode> {
    if let Some(exact) = pages.iter().find(|r| r.path == target) {
        return vec![*exact];
    }
    pages
        .iter()
        .filter(|r| matches_route(&r.path, target))
        .copied()
        .collect()
}

/// Callsites in the same file whose line falls inside the handler body.
fn triggered_callsites(graph: &AppGraph, action: &UiActionNode) -> Vec<String> {
    let Some((start, end)) = action.handler_lines else {
        return Vec::new();
    };
    graph
        .callsites()
        .filter(|c| c.file_path == action.file_path)
        .filter(|c| c.line.map(|l| l >= start && l <= end).unwrap_or(false))
        .map(|c| c.id.clone())
        .collect()
}

/// An unspecified method on either side matches anything.
fn method_compatible(call: Option<&str>, endpoint: Option<&str>) -> bool {
    match (call, endpoint) {
        (Some(c), Some(e)) => c.eq_ignore_ascii_case(e),
        _ => true,
    }
}

/// Whether a query line lies within an endpoint's body. Without a line
/// range the whole file counts.
fn within_endpoint(endpoint: &EndpointNode, line: Option<usize>) -> bool {
    match (endpoint.line, endpoint.end_line, line) {
        (Some(start), Some(end), Some(l)) => l >= start && l <= end,
        _ => true,
    }
}
