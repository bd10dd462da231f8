//! Server endpoints: route handlers, pages API handlers and server actions.

use regex::Regex;
use std::collections::HashMap;
use tree_sitter::Node;

use super::{per_file, ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, EndpointNode, GraphNode, NodeKind};
use crate::index::FileEntry;
use crate::router::route_for_file;
use crate::source::{directive, visit, ParsedSource};

/// Methods an app-router route file may export.
pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const MUTATING_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Name prefixes that mark a server action as a write.
const MUTATING_VERBS: &[&str] = &[
    "create", "update", "delete", "remove", "save", "submit", "add", "insert", "upsert", "set",
    "edit", "destroy", "archive", "publish", "cancel", "approve", "reject",
];

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "arrow_function",
];

lazy_static::lazy_static! {
    static ref TABLE_ACCESS: Regex = Regex::new(r#"\.\s*from\s*\(\s*['"`]"#).unwrap();
    static ref TABLE_WRITE: Regex =
        Regex::new(r"\.\s*(?:insert|upsert|update|delete)\s*\(").unwrap();
    static ref MUTATING_METHOD_CHECK: Regex = Regex::new(
        r#"(?:\.method\s*[!=]==?\s*|case\s+)['"](?:POST|PUT|PATCH|DELETE)['"]"#
    ).unwrap();
}

pub struct EndpointExtractor;

impl Extractor for EndpointExtractor {
    fn name(&self) -> &'static str {
        "endpoints"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let nodes = per_file(ctx.source_files(), |file| {
            match ctx.sources.get_source_file(file) {
                Some(parsed) => endpoints_in_file(file, &parsed),
                None => Vec::new(),
            }
        });
        graph.extend_nodes(nodes);
    }
}

/// An exported function-like binding.
struct Export<'t> {
    name: String,
    node: Node<'t>,
    is_default: bool,
}

fn endpoints_in_file(file: &FileEntry, parsed: &ParsedSource) -> Vec<GraphNode> {
    let mut nodes = Vec::new();
    let exports = exported_functions(parsed);
    let route = route_for_file(&file.rel_path).filter(|r| r.is_api);

    if let Some(route) = route {
        if file.stem() == "route" && is_app_router(&file.rel_path) {
            for export in exports.iter().filter(|e| HTTP_METHODS.contains(&e.name.as_str())) {
                nodes.push(endpoint(
                    node_id(NodeKind::Endpoint, &[&route.path, &export.name]),
                    &route.path,
                    file,
                    export.node,
                    Some(export.name.clone()),
                    MUTATING_METHODS.contains(&export.name.as_str()),
                    false,
                ));
            }
        } else if let Some(export) = exports.iter().find(|e| e.is_default) {
            let body = parsed.node_text(export.node);
            let mutates = MUTATING_METHOD_CHECK.is_match(body) || writes_table(body);
            nodes.push(endpoint(
                node_id(NodeKind::Endpoint, &[&route.path]),
                &route.path,
                file,
                export.node,
                None,
                mutates,
                false,
            ));
        }
        return nodes;
    }

    // Every export of a "use server" module is an action
    if directive(&parsed.text) == Some("use server") {
        for export in &exports {
            if is_function_like(export.node) {
                nodes.push(server_action(file, parsed, &export.name, export.node));
            }
        }
    }

    // Functions that opt in with a body directive
    visit(parsed.root(), &mut |node| {
        if !FUNCTION_KINDS.contains(&node.kind()) || !has_use_server_body(parsed, node) {
            return;
        }
        if let Some(name) = function_name(parsed, node) {
            nodes.push(server_action(file, parsed, &name, node));
        }
    });

    nodes
}

fn is_app_router(rel_path: &str) -> bool {
    rel_path.starts_with("app/") || rel_path.starts_with("src/app/")
}

fn endpoint(
    id: String,
    path_or_name: &str,
    file: &FileEntry,
    node: Node,
    method: Option<String>,
    mutates_data: bool,
    is_server_action: bool,
) -> GraphNode {
    GraphNode::Endpoint(EndpointNode {
        id,
        path_or_name: path_or_name.to_string(),
        file_path: file.rel_path.clone(),
        line: Some(node.start_position().row + 1),
        end_line: Some(node.end_position().row + 1),
        method,
        mutates_data,
        is_server_action,
        is_api_route: !is_server_action,
    })
}

fn server_action(file: &FileEntry, parsed: &ParsedSource, name: &str, node: Node) -> GraphNode {
    let mutates = writes_table(parsed.node_text(node)) || has_mutating_verb(name);
    endpoint(
        node_id(NodeKind::Endpoint, &[name, &file.rel_path]),
        name,
        file,
        node,
        None,
        mutates,
        true,
    )
}

fn writes_table(body: &str) -> bool {
    TABLE_ACCESS.is_match(body) && TABLE_WRITE.is_match(body)
}

/// `createOrder` and `delete_item` count; `settings` does not.
pub(crate) fn has_mutating_verb(name: &str) -> bool {
    MUTATING_VERBS.iter().any(|verb| {
        name.strip_prefix(verb)
            .map(|rest| {
                rest.is_empty()
                    || rest.starts_with('_')
                    || rest.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            })
            .unwrap_or(false)
    })
}

fn is_function_like(node: Node) -> bool {
    if FUNCTION_KINDS.contains(&node.kind()) {
        return true;
    }
    // `export const action = withAuth(async () => ...)`
    node.kind() == "call_expression"
        && node
            .child_by_field_name("arguments")
            .map(|args| {
                let mut cursor = args.walk();
                let found = args
                    .named_children(&mut cursor)
                    .any(|a| FUNCTION_KINDS.contains(&a.kind()));
                found
            })
            .unwrap_or(false)
}

fn has_use_server_body(parsed: &ParsedSource, function: Node) -> bool {
    let Some(body) = function.child_by_field_name("body") else {
        return false;
    };
    if body.kind() != "statement_block" {
        return false;
    }
    let Some(first) = body.named_child(0) else {
        return false;
    };
    if first.kind() != "expression_statement" {
        return false;
    }
    let text = parsed.node_text(first).trim_end_matches(';').trim();
    text == "\"use server\"" || text == "'use server'"
}

/// Name of a function from its declaration or the variable it is bound to.
fn function_name(parsed: &ParsedSource, function: Node) -> Option<String> {
    if let Some(name) = function.child_by_field_name("name") {
        return Some(parsed.node_text(name).to_string());
    }
    let parent = function.parent()?;
    if parent.kind() == "variable_declarator" {
        let name = parent.child_by_field_name("name")?;
        return Some(parsed.node_text(name).to_string());
    }
    None
}

/// Top-level functions by name, for resolving `export default handler`
/// and `export { handler as GET }`.
fn local_functions<'t>(parsed: &'t ParsedSource) -> HashMap<String, Node<'t>> {
    let mut map = HashMap::new();
    let root = parsed.root();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        for (name, node) in declared_functions(parsed, child) {
            map.entry(name).or_insert(node);
        }
    }
    map
}

/// Named bindings introduced by a declaration.
fn declared_functions<'t>(parsed: &'t ParsedSource, decl: Node<'t>) -> Vec<(String, Node<'t>)> {
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" => decl
            .child_by_field_name("name")
            .map(|n| vec![(parsed.node_text(n).to_string(), decl)])
            .unwrap_or_default(),
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = decl.walk();
            decl.named_children(&mut cursor)
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|declarator| {
                    let name = declarator.child_by_field_name("name")?;
                    let value = declarator.child_by_field_name("value")?;
                    Some((parsed.node_text(name).to_string(), value))
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn exported_functions<'t>(parsed: &'t ParsedSource) -> Vec<Export<'t>> {
    let root = parsed.root();
    let locals = local_functions(parsed);
    let mut exports = Vec::new();

    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        if stmt.kind() != "export_statement" {
            continue;
        }
        let is_default = {
            let mut c = stmt.walk();
            let found = stmt.children(&mut c).any(|t| t.kind() == "default");
            found
        };

        if let Some(decl) = stmt.child_by_field_name("declaration") {
            for (name, node) in declared_functions(parsed, decl) {
                exports.push(Export { name, node, is_default });
            }
            continue;
        }

        if let Some(value) = stmt.child_by_field_name("value") {
            let node = if value.kind() == "identifier" {
                locals.get(parsed.node_text(value)).copied()
            } else {
                Some(value)
            };
            if let Some(node) = node {
                exports.push(Export {
                    name: "default".to_string(),
                    node,
                    is_default: true,
                });
            }
            continue;
        }

        // export { local as exported }
        let mut c = stmt.walk();
        for clause in stmt.named_children(&mut c).filter(|n| n.kind() == "export_clause") {
            let mut sc = clause.walk();
            for spec in clause.named_children(&mut sc) {
                let Some(local) = spec.child_by_field_name("name") else {
                    continue;
                };
                let local = parsed.node_text(local);
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|a| parsed.node_text(a))
                    .unwrap_or(local);
                if let Some(node) = locals.get(local) {
                    exports.push(Export {
                        name: exported.to_string(),
                        node: *node,
                        is_default: exported == "default",
                    });
                }
            }
        }
    }

    exports
}
