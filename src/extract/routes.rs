//! Routes from file-system router conventions.

use super::{ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, GraphNode, NodeKind, RouteNode};
use crate::router::route_for_file;

pub struct RouteExtractor;

impl Extractor for RouteExtractor {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let nodes: Vec<GraphNode> = ctx
            .source_files()
            .filter_map(|file| {
                let route = route_for_file(&file.rel_path)?;
                Some(GraphNode::Route(RouteNode {
                    id: node_id(NodeKind::Route, &[&route.path]),
                    path: route.path,
                    file_path: file.rel_path.clone(),
                    is_api: route.is_api,
                    is_page: route.is_page,
                }))
            })
            .collect();
        graph.extend_nodes(nodes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FileEntry;
    use std::path::PathBuf;

    fn file(rel: &str) -> FileEntry {
        FileEntry {
            path: PathBuf::from("/project").join(rel),
            rel_path: rel.to_string(),
            extension: rel.rsplit('.').next().unwrap().to_string(),
            is_migration: rel.ends_with(".sql"),
        }
    }

    #[test]
    fn test_routes_from_both_routers() {
        let ctx = ExtractContext::new(
            PathBuf::from("/project"),
            vec![
                file("app/(shop)/orders/page.tsx"),
                file("app/api/orders/route.ts"),
                file("components/Nav.tsx"),
                file("pages/about.tsx"),
                file("pages/_app.tsx"),
            ],
        );
        let mut graph = AppGraph::new();
        RouteExtractor.extract(&ctx, &mut graph);

        let paths: Vec<_> = graph.routes().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/about", "/api/orders", "/orders"]);

        let api = graph.node("route:/api/orders").unwrap();
        assert!(matches!(api, GraphNode::Route(r) if r.is_api && !r.is_page));
    }

    #[test]
    fn test_first_route_file_wins() {
        let ctx = ExtractContext::new(
            PathBuf::from("/project"),
            vec![file("app/about/page.tsx"), file("pages/about.tsx")],
        );
        let mut graph = AppGraph::new();
        RouteExtractor.extract(&ctx, &mut graph);

        assert_eq!(graph.count_of_kind(NodeKind::Route), 1);
        assert_eq!(graph.node("route:/about").unwrap().file_path(), "app/about/page.tsx");
    }
}
