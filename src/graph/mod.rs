//! In-memory application graph.
//!
//! A heterogeneous directed multigraph: typed nodes keyed by stable id and
//! typed edges. Nodes are append-only; an id that is already present keeps
//! its first node. Edges are never deduplicated, since repeated links
//! between the same pair are meaningful to some rules.

mod id;
mod node;

pub use id::{node_id, path_key, DEFAULT_KEY};
pub use node::{
    CallsiteNode, CallsiteType, EndpointNode, EnvVarNode, GraphNode, MigrationNode, NodeKind,
    QueryOperation, RouteNode, SupabaseQueryNode, UiActionNode,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Route -> UiAction rendered on that page.
    Renders,
    /// UiAction or Callsite -> Route it navigates to.
    Navigates,
    /// UiAction -> server action Endpoint bound as its handler.
    Calls,
    /// UiAction -> Callsite inside its handler body.
    Triggers,
    /// Callsite -> Endpoint it requests or invokes.
    Targets,
    /// Route -> Endpoint serving it.
    HandledBy,
    /// Endpoint -> SupabaseQuery executed in its body.
    Queries,
    /// SupabaseQuery -> Migration describing its table.
    Touches,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Renders => "renders",
            EdgeKind::Navigates => "navigates",
            EdgeKind::Calls => "calls",
            EdgeKind::Triggers => "triggers",
            EdgeKind::Targets => "targets",
            EdgeKind::HandledBy => "handled_by",
            EdgeKind::Queries => "queries",
            EdgeKind::Touches => "touches",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// The scan-scoped application graph.
#[derive(Debug, Default)]
pub struct AppGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    by_kind: BTreeMap<NodeKind, BTreeSet<String>>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl AppGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns false (and keeps the existing node) if the id
    /// is already taken.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.by_kind.entry(node.kind()).or_default().insert(id.clone());
        self.nodes.insert(id, node);
        true
    }

    /// Insert many nodes in order; returns how many were new.
    pub fn extend_nodes<I: IntoIterator<Item = GraphNode>>(&mut self, nodes: I) -> usize {
        let mut added = 0;
        for node in nodes {
            if self.add_node(node) {
                added += 1;
            }
        }
        added
    }

    /// Add an edge between two existing nodes. Returns false if either end
    /// is unknown.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> bool {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return false;
        }
        let idx = self.edges.len();
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        });
        self.outgoing.entry(from.to_string()).or_default().push(idx);
        self.incoming.entry(to.to_string()).or_default().push(idx);
        true
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes of one kind, in id order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.nodes.get(id))
    }

    pub fn count_of_kind(&self, kind: NodeKind) -> usize {
        self.by_kind.get(&kind).map(|s| s.len()).unwrap_or(0)
    }

    /// Node counts for every kind, zero included.
    pub fn kind_counts(&self) -> BTreeMap<NodeKind, usize> {
        NodeKind::ALL
            .iter()
            .map(|k| (*k, self.count_of_kind(*k)))
            .collect()
    }

    /// Targets of outgoing edges of the given kind, in insertion order.
    /// Repeated edges yield repeated targets.
    pub fn successors(&self, id: &str, kind: EdgeKind) -> Vec<&GraphNode> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(|e| e.kind == kind)
            .filter_map(|e| self.nodes.get(&e.to))
            .collect()
    }

    /// Sources of incoming edges of the given kind, in insertion order.
    pub fn predecessors(&self, id: &str, kind: EdgeKind) -> Vec<&GraphNode> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(|e| e.kind == kind)
            .filter_map(|e| self.nodes.get(&e.from))
            .collect()
    }

    pub fn has_outgoing(&self, id: &str, kind: EdgeKind) -> bool {
        self.outgoing
            .get(id)
            .map(|idx| idx.iter().any(|&i| self.edges[i].kind == kind))
            .unwrap_or(false)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteNode> {
        self.nodes_of_kind(NodeKind::Route).filter_map(|n| match n {
            GraphNode::Route(r) => Some(r),
            _ => None,
        })
    }

    pub fn ui_actions(&self) -> impl Iterator<Item = &UiActionNode> {
        self.nodes_of_kind(NodeKind::UiAction).filter_map(|n| match n {
            GraphNode::UiAction(a) => Some(a),
            _ => None,
        })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointNode> {
        self.nodes_of_kind(NodeKind::Endpoint).filter_map(|n| match n {
            GraphNode::Endpoint(e) => Some(e),
            _ => None,
        })
    }

    pub fn callsites(&self) -> impl Iterator<Item = &CallsiteNode> {
        self.nodes_of_kind(NodeKind::Callsite).filter_map(|n| match n {
            GraphNode::Callsite(c) => Some(c),
            _ => None,
        })
    }

    pub fn queries(&self) -> impl Iterator<Item = &SupabaseQueryNode> {
        self.nodes_of_kind(NodeKind::SupabaseQuery)
            .filter_map(|n| match n {
                GraphNode::SupabaseQuery(q) => Some(q),
                _ => None,
            })
    }

    pub fn migrations(&self) -> impl Iterator<Item = &MigrationNode> {
        self.nodes_of_kind(NodeKind::Migration).filter_map(|n| match n {
            GraphNode::Migration(m) => Some(m),
            _ => None,
        })
    }

    pub fn env_vars(&self) -> impl Iterator<Item = &EnvVarNode> {
        self.nodes_of_kind(NodeKind::EnvVar).filter_map(|n| match n {
            GraphNode::EnvVar(e) => Some(e),
            _ => None,
        })
    }
}
