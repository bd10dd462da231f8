//! Rules over UI actions and the callsites they drive.

use super::{Finding, Rule, Severity};
use crate::graph::{AppGraph, CallsiteType, EdgeKind, NodeKind};
use crate::router::normalize_target;

/// Whether a navigation target should resolve to a page route. API paths
/// and static assets (`/logo.svg`) are served elsewhere.
fn is_page_target(path: &str) -> bool {
    if path == "/api" || path.starts_with("/api/") {
        return false;
    }
    let last = path.rsplit('/').next().unwrap_or(path);
    !last.contains('.')
}

/// A button or link whose handler does nothing useful.
pub struct StubUiAction;

impl Rule for StubUiAction {
    fn id(&self) -> &'static str {
        "stub-ui-action"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "UI action with an empty or placeholder handler"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .ui_actions()
            .filter(|a| a.suspicious == Some(true))
            .map(|a| {
                let label = a.label.as_deref().unwrap_or(&a.element);
                let mut message = format!("\"{}\" in {}", label, a.file_path);
                if let Some(line) = a.line {
                    message.push_str(&format!(":{}", line));
                }
                match a.suspicion.as_deref() {
                    Some(kind) => message.push_str(&format!(" has a stub handler ({})", kind)),
                    None => message.push_str(" has a stub handler"),
                }
                self.finding(message, vec![a.id.clone()])
            })
            .collect()
    }
}

/// A request to `/api/...` that no route serves.
pub struct DanglingApiCall;

impl Rule for DanglingApiCall {
    fn id(&self) -> &'static str {
        "dangling-api-call"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "HTTP call to an API path with no matching route handler"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        if graph.count_of_kind(NodeKind::Route) == 0 {
            return Vec::new();
        }
        graph
            .callsites()
            .filter(|c| c.call_type.is_http())
            .filter(|c| !graph.has_outgoing(&c.id, EdgeKind::Targets))
            .filter_map(|c| {
                let target = c.target_path.as_deref().and_then(normalize_target)?;
                if target != "/api" && !target.starts_with("/api/") {
                    return None;
                }
                let method = c.method.as_deref().unwrap_or("any method");
                Some(self.finding(
                    format!(
                        "{} {} in {} has no matching route handler",
                        method, target, c.file_path
                    ),
                    vec![c.id.clone()],
                ))
            })
            .collect()
    }
}

/// An internal link or router call to a page that does not exist.
pub struct DeadNavigation;

impl Rule for DeadNavigation {
    fn id(&self) -> &'static str {
        "dead-navigation"
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Link or router navigation to a path with no page"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        if graph.count_of_kind(NodeKind::Route) == 0 {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for action in graph.ui_actions() {
            let Some(target) = action.href.as_deref().and_then(normalize_target) else {
                continue;
            };
            if !is_page_target(&target)
                || graph.has_outgoing(&action.id, EdgeKind::Navigates)
                || graph.has_outgoing(&action.id, EdgeKind::Calls)
            {
                continue;
            }
            findings.push(self.finding(
                format!("link to {} in {} matches no page", target, action.file_path),
                vec![action.id.clone()],
            ));
        }

        for callsite in graph
            .callsites()
            .filter(|c| c.call_type == CallsiteType::Router)
        {
            let Some(target) = callsite.target_path.as_deref().and_then(normalize_target) else {
                continue;
            };
            if !is_page_target(&target) || graph.has_outgoing(&callsite.id, EdgeKind::Navigates) {
                continue;
            }
            findings.push(self.finding(
                format!(
                    "navigation to {} in {} matches no page",
                    target, callsite.file_path
                ),
                vec![callsite.id.clone()],
            ));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use crate::rules::fixtures::{callsite, page, ui};

    #[test]
    fn test_stub_ui_action_message() {
        let mut graph = AppGraph::new();
        let mut stub = ui("app/checkout/page.tsx", 5);
        stub.label = Some("Pay now".to_string());
        stub.suspicious = Some(true);
        stub.suspicion = Some("console-only".to_string());
        graph.add_node(GraphNode::UiAction(stub.clone()));

        let mut fine = ui("app/checkout/page.tsx", 9);
        fine.suspicious = Some(false);
        graph.add_node(GraphNode::UiAction(fine));
        graph.add_node(GraphNode::UiAction(ui("app/other.tsx", 1)));

        let findings = StubUiAction.evaluate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].node_refs, vec![stub.id]);
        assert_eq!(
            findings[0].message,
            "\"Pay now\" in app/checkout/page.tsx:5 has a stub handler (console-only)"
        );
    }

    #[test]
    fn test_dangling_api_call() {
        let mut graph = AppGraph::new();
        graph.add_node(page("/"));
        let missing = callsite("components/A.tsx", 3, CallsiteType::Fetch, "/api/missing");
        let external = callsite("components/A.tsx", 4, CallsiteType::Fetch, "https://example.com/api/x");
        let served = callsite("components/A.tsx", 5, CallsiteType::Axios, "/api/ok");
        for c in [&missing, &external, &served] {
            graph.add_node(GraphNode::Callsite(c.clone()));
        }
        // Any target edge counts as resolved
        graph.add_edge(&served.id, "route:/", EdgeKind::Targets);

        let findings = DanglingApiCall.evaluate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].node_refs, vec![missing.id]);
        assert!(findings[0].message.starts_with("any method /api/missing"));
    }

    #[test]
    fn test_no_routes_means_no_route_findings() {
        let mut graph = AppGraph::new();
        graph.add_node(GraphNode::Callsite(callsite(
            "components/A.tsx",
            3,
            CallsiteType::Fetch,
            "/api/missing",
        )));
        let mut link = ui("components/Nav.tsx", 2);
        link.href = Some("/nowhere".to_string());
        graph.add_node(GraphNode::UiAction(link));

        assert!(DanglingApiCall.evaluate(&graph).is_empty());
        assert!(DeadNavigation.evaluate(&graph).is_empty());
    }

    #[test]
    fn test_dead_navigation() {
        let mut graph = AppGraph::new();
        graph.add_node(page("/about"));

        let mut live = ui("components/Nav.tsx", 2);
        live.href = Some("/about".to_string());
        let mut dead = ui("components/Nav.tsx", 3);
        dead.href = Some("/pricing?plan=pro".to_string());
        let mut asset = ui("components/Nav.tsx", 4);
        asset.href = Some("/brochure.pdf".to_string());
        let mut outside = ui("components/Nav.tsx", 5);
        outside.href = Some("https://example.com".to_string());
        for a in [&live, &dead, &asset, &outside] {
            graph.add_node(GraphNode::UiAction(a.clone()));
        }
        graph.add_edge(&live.id, "route:/about", EdgeKind::Navigates);

        let push = callsite("components/Nav.tsx", 9, CallsiteType::Router, "/settings");
        graph.add_node(GraphNode::Callsite(push.clone()));

        let findings = DeadNavigation.evaluate(&graph);
        let refs: Vec<_> = findings.iter().map(|f| f.node_refs[0].clone()).collect();
        assert_eq!(refs, vec![dead.id, push.id]);
        assert!(findings[0].message.starts_with("link to /pricing "));
    }
}
