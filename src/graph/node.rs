//! Typed graph nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven kinds of fact the extractors produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Route,
    UiAction,
    Endpoint,
    Callsite,
    SupabaseQuery,
    Migration,
    EnvVar,
}

impl NodeKind {
    /// Every kind, in report order.
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Route,
        NodeKind::UiAction,
        NodeKind::Endpoint,
        NodeKind::Callsite,
        NodeKind::SupabaseQuery,
        NodeKind::Migration,
        NodeKind::EnvVar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Route => "route",
            NodeKind::UiAction => "ui_action",
            NodeKind::Endpoint => "endpoint",
            NodeKind::Callsite => "callsite",
            NodeKind::SupabaseQuery => "supabase_query",
            NodeKind::Migration => "migration",
            NodeKind::EnvVar => "env_var",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A page or API route discovered from the file-system router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteNode {
    pub id: String,
    pub path: String,
    pub file_path: String,
    pub is_api: bool,
    pub is_page: bool,
}

/// An interactive element found in rendered markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiActionNode {
    pub id: String,
    pub file_path: String,
    pub line: Option<usize>,
    pub label: Option<String>,
    pub element: String,
    pub href: Option<String>,
    pub handler_name: Option<String>,
    pub suspicious: Option<bool>,
    /// Which stub check flagged the handler.
    pub suspicion: Option<String>,
    /// First and last line of the resolved handler body.
    pub handler_lines: Option<(usize, usize)>,
    pub route_path: Option<String>,
}

/// A callable server handler: route method, pages API handler or server action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointNode {
    pub id: String,
    pub path_or_name: String,
    pub file_path: String,
    pub line: Option<usize>,
    pub end_line: Option<usize>,
    pub method: Option<String>,
    pub mutates_data: bool,
    pub is_server_action: bool,
    pub is_api_route: bool,
}

/// How a callsite reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallsiteType {
    Fetch,
    Axios,
    Router,
    ServerAction,
}

impl CallsiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallsiteType::Fetch => "fetch",
            CallsiteType::Axios => "axios",
            CallsiteType::Router => "router",
            CallsiteType::ServerAction => "serverAction",
        }
    }

    /// Whether this callsite performs an HTTP request.
    pub fn is_http(&self) -> bool {
        matches!(self, CallsiteType::Fetch | CallsiteType::Axios)
    }
}

/// A place that invokes an endpoint or navigates to a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsiteNode {
    pub id: String,
    pub file_path: String,
    pub line: Option<usize>,
    #[serde(rename = "type")]
    pub call_type: CallsiteType,
    pub target_path: Option<String>,
    pub target_symbol: Option<String>,
    pub method: Option<String>,
}

/// Supabase query builder operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperation {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
    Rpc,
}

impl QueryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::Select => "select",
            QueryOperation::Insert => "insert",
            QueryOperation::Update => "update",
            QueryOperation::Delete => "delete",
            QueryOperation::Upsert => "upsert",
            QueryOperation::Rpc => "rpc",
        }
    }

    /// Whether the operation writes rows.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            QueryOperation::Insert
                | QueryOperation::Update
                | QueryOperation::Delete
                | QueryOperation::Upsert
        )
    }
}

/// A data-access call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupabaseQueryNode {
    pub id: String,
    pub file_path: String,
    pub line: Option<usize>,
    pub table: String,
    pub operation: QueryOperation,
    pub has_pagination: Option<bool>,
    pub select_all: Option<bool>,
    pub is_client: bool,
    pub is_single_row: Option<bool>,
    pub is_count_only: Option<bool>,
}

/// Synthesized facts about one table, or one destructive migration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationNode {
    pub id: String,
    pub file_path: String,
    pub table: Option<String>,
    pub rls_enabled: Option<bool>,
    pub policy_count: Option<usize>,
    pub has_destructive_ddl: Option<bool>,
    pub has_index: Option<bool>,
}

/// An environment-variable read site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarNode {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub line: Option<usize>,
    pub is_public: bool,
    pub in_example: Option<bool>,
    /// Whether the reading file is a client-boundary file.
    pub is_client: bool,
}

/// A node in the application graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphNode {
    Route(RouteNode),
    UiAction(UiActionNode),
    Endpoint(EndpointNode),
    Callsite(CallsiteNode),
    SupabaseQuery(SupabaseQueryNode),
    Migration(MigrationNode),
    EnvVar(EnvVarNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Route(n) => &n.id,
            GraphNode::UiAction(n) => &n.id,
            GraphNode::Endpoint(n) => &n.id,
            GraphNode::Callsite(n) => &n.id,
            GraphNode::SupabaseQuery(n) => &n.id,
            GraphNode::Migration(n) => &n.id,
            GraphNode::EnvVar(n) => &n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Route(_) => NodeKind::Route,
            GraphNode::UiAction(_) => NodeKind::UiAction,
            GraphNode::Endpoint(_) => NodeKind::Endpoint,
            GraphNode::Callsite(_) => NodeKind::Callsite,
            GraphNode::SupabaseQuery(_) => NodeKind::SupabaseQuery,
            GraphNode::Migration(_) => NodeKind::Migration,
            GraphNode::EnvVar(_) => NodeKind::EnvVar,
        }
    }

    /// The source file the node was extracted from.
    pub fn file_path(&self) -> &str {
        match self {
            GraphNode::Route(n) => &n.file_path,
            GraphNode::UiAction(n) => &n.file_path,
            GraphNode::Endpoint(n) => &n.file_path,
            GraphNode::Callsite(n) => &n.file_path,
            GraphNode::SupabaseQuery(n) => &n.file_path,
            GraphNode::Migration(n) => &n.file_path,
            GraphNode::EnvVar(n) => &n.file_path,
        }
    }

    /// 1-indexed line, when the node has a single source position.
    pub fn line(&self) -> Option<usize> {
        match self {
            GraphNode::Route(_) | GraphNode::Migration(_) => None,
            GraphNode::UiAction(n) => n.line,
            GraphNode::Endpoint(n) => n.line,
            GraphNode::Callsite(n) => n.line,
            GraphNode::SupabaseQuery(n) => n.line,
            GraphNode::EnvVar(n) => n.line,
        }
    }
}
