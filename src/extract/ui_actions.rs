//! Interactive JSX elements and their handlers.
//!
//! Finds buttons, links and forms in rendered markup, resolves each
//! handler to a function body in the same file where possible, and checks
//! that body for placeholder behaviour.

use regex::Regex;
use std::collections::HashMap;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use super::{literal_value, per_file, ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, GraphNode, NodeKind, UiActionNode};
use crate::index::FileEntry;
use crate::router::route_for_file;
use crate::source::{language_for, visit, ParsedSource};

static ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "button",
    "a",
    "form",
    "Link",
    "Button",
    "IconButton",
    "MenuItem",
    "DropdownMenuItem",
};

/// Handler attributes, first present wins.
const HANDLER_ATTRS: &[&str] = &["onClick", "onSubmit", "action", "formAction"];

/// Label attributes, in precedence order.
const LABEL_ATTRS: &[&str] = &["aria-label", "title", "data-testid"];

/// Extensions parsed with the TSX grammar.
const JSX_EXTENSIONS: &[&str] = &["tsx", "jsx", "js", "mjs", "cjs"];

const ELEMENT_QUERY: &str = r#"
(jsx_opening_element name: (_) @name) @element
(jsx_self_closing_element name: (_) @name) @element
"#;

lazy_static::lazy_static! {
    static ref LINE_COMMENT: Regex = Regex::new(r"//[^\n]*").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref STRING_LITERAL: Regex =
        Regex::new(r#"'[^'\n]*'|"[^"\n]*"|`[^`]*`"#).unwrap();

    static ref CONSOLE_CALL: Regex =
        Regex::new(r"(?s)^console\s*\.\s*\w+\s*\(.*\)$").unwrap();
    static ref NOTIFY_CALL: Regex = Regex::new(
        r"(?s)^(?:await\s+)?(?:window\s*\.\s*)?(?:alert|toast(?:\s*\.\s*\w+)?)\s*\(.*\)$"
    ).unwrap();
    static ref BARE_RETURN: Regex =
        Regex::new(r"^return(?:\s+(?:null|undefined|false))?$").unwrap();
    static ref COMMENT_MARKER: Regex =
        Regex::new(r"(?i)\b(?:todo|fixme)\b|coming soon|not implemented").unwrap();
    // Strings name tables and routes, so only the shouted form counts there
    static ref STRING_MARKER: Regex =
        Regex::new(r"\b(?:TODO|FIXME)\b|(?i:coming soon|not implemented)").unwrap();
}

/// Why a handler looks like a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspicion {
    /// No statements at all.
    EmptyBody,
    /// Only empty statements.
    BareSemicolon,
    /// Only logs to the console.
    ConsoleOnly,
    /// Only shows a toast or alert.
    NotificationOnly,
    /// Only returns immediately.
    BareReturn,
    /// Mentions TODO, FIXME, "coming soon" or "not implemented".
    StubMarker,
}

impl Suspicion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suspicion::EmptyBody => "empty-body",
            Suspicion::BareSemicolon => "bare-semicolon",
            Suspicion::ConsoleOnly => "console-only",
            Suspicion::NotificationOnly => "notification-only",
            Suspicion::BareReturn => "bare-return",
            Suspicion::StubMarker => "stub-marker",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Suspicion::EmptyBody => "handler body is empty",
            Suspicion::BareSemicolon => "handler body is a bare semicolon",
            Suspicion::ConsoleOnly => "handler only logs to the console",
            Suspicion::NotificationOnly => "handler only shows a toast or alert",
            Suspicion::BareReturn => "handler returns immediately",
            Suspicion::StubMarker => "handler is marked as unfinished",
        }
    }
}

impl std::fmt::Display for Suspicion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Classify a handler body (without enclosing braces). Checks run in fixed
/// priority order; the first match wins.
pub fn classify_handler(body: &str) -> Option<Suspicion> {
    let code = strip_comments(body);
    let code = code.trim();

    if code.is_empty() {
        return Some(Suspicion::EmptyBody);
    }
    if code.chars().all(|c| c == ';' || c.is_whitespace()) {
        return Some(Suspicion::BareSemicolon);
    }

    let statements = split_statements(code);
    if statements.iter().all(|s| CONSOLE_CALL.is_match(s)) {
        return Some(Suspicion::ConsoleOnly);
    }
    if statements.iter().all(|s| NOTIFY_CALL.is_match(s)) {
        return Some(Suspicion::NotificationOnly);
    }
    if let [only] = statements.as_slice() {
        if BARE_RETURN.is_match(only) {
            return Some(Suspicion::BareReturn);
        }
    }

    // Markers count in comments and string literals only
    let comments: Vec<&str> = LINE_COMMENT
        .find_iter(body)
        .chain(BLOCK_COMMENT.find_iter(body))
        .map(|m| m.as_str())
        .collect();
    let strings: Vec<&str> = STRING_LITERAL.find_iter(code).map(|m| m.as_str()).collect();
    if comments.iter().any(|t| COMMENT_MARKER.is_match(t))
        || strings.iter().any(|t| STRING_MARKER.is_match(t))
    {
        return Some(Suspicion::StubMarker);
    }

    None
}

fn strip_comments(text: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(text, " ");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Split code into top-level statements on `;` and line breaks.
fn split_statements(code: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in code.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && (c == ';' || c == '\n') {
            statements.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct UiActionExtractor;

impl Extractor for UiActionExtractor {
    fn name(&self) -> &'static str {
        "ui-actions"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let files = ctx
            .source_files()
            .filter(|f| JSX_EXTENSIONS.contains(&f.extension.as_str()));
        let nodes = per_file(files, |file| match ctx.sources.get_source_file(file) {
            Some(parsed) => actions_in_file(file, &parsed),
            None => Vec::new(),
        });
        graph.extend_nodes(nodes);
    }
}

enum AttrValue<'t> {
    Literal(String),
    Expr(Node<'t>),
}

fn actions_in_file(file: &FileEntry, parsed: &ParsedSource) -> Vec<GraphNode> {
    let language = language_for(&file.extension);
    let Ok(query) = Query::new(&language, ELEMENT_QUERY) else {
        return Vec::new();
    };
    let (Some(element_idx), Some(name_idx)) = (
        query.capture_index_for_name("element"),
        query.capture_index_for_name("name"),
    ) else {
        return Vec::new();
    };

    let handlers = local_handlers(parsed);
    let route_path = route_for_file(&file.rel_path)
        .filter(|r| r.is_page)
        .map(|r| r.path);

    let mut nodes = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.root(), parsed.text.as_bytes());

    while let Some(m) = matches.next() {
        let mut element = None;
        let mut name = None;
        for capture in m.captures {
            if capture.index == element_idx {
                element = Some(capture.node);
            } else if capture.index == name_idx {
                name = Some(capture.node);
            }
        }
        let (Some(element), Some(name)) = (element, name) else {
            continue;
        };
        let element_name = parsed.node_text(name);
        if !ELEMENTS.contains(element_name) {
            continue;
        }

        nodes.push(GraphNode::UiAction(ui_action(
            file,
            parsed,
            element,
            element_name,
            &handlers,
            route_path.clone(),
        )));
    }

    nodes
}

fn ui_action<'t>(
    file: &FileEntry,
    parsed: &'t ParsedSource,
    element: Node<'t>,
    element_name: &str,
    handlers: &HashMap<String, Node<'t>>,
    route_path: Option<String>,
) -> UiActionNode {
    let attrs = attributes(parsed, element);
    let literal = |key: &str| {
        attrs.iter().find_map(|(k, v)| match v {
            AttrValue::Literal(s) if k == key => Some(s.clone()),
            _ => None,
        })
    };

    let label = LABEL_ATTRS
        .iter()
        .find_map(|key| literal(*key))
        .or_else(|| text_content(parsed, element));

    let mut href = literal("href");
    let mut handler_name = None;
    let mut body = None;

    for key in HANDLER_ATTRS {
        let Some((_, value)) = attrs.iter().find(|(k, _)| k == key) else {
            continue;
        };
        match value {
            // `<form action="/api/x">` posts to a URL
            AttrValue::Literal(url) => {
                if href.is_none() {
                    href = Some(url.clone());
                }
            }
            AttrValue::Expr(expr) => match expr.kind() {
                "identifier" => {
                    let name = parsed.node_text(*expr);
                    handler_name = Some(name.to_string());
                    body = handlers.get(name).copied();
                }
                "arrow_function" | "function_expression" | "function" => {
                    body = expr.child_by_field_name("body");
                }
                "call_expression" => {
                    handler_name = expr
                        .child_by_field_name("function")
                        .map(|f| parsed.node_text(f).to_string());
                }
                _ => handler_name = Some(parsed.node_text(*expr).to_string()),
            },
        }
        break;
    }

    let suspicion = body.map(|b| classify_handler(&body_text(parsed, b)));
    let start = element.start_position();

    UiActionNode {
        id: node_id(
            NodeKind::UiAction,
            &[
                &file.rel_path,
                &format!("{}:{}", start.row + 1, start.column + 1),
                element_name,
            ],
        ),
        file_path: file.rel_path.clone(),
        line: Some(start.row + 1),
        label,
        element: element_name.to_string(),
        href,
        handler_name,
        suspicious: suspicion.map(|s| s.is_some()),
        suspicion: suspicion.flatten().map(|s| s.as_str().to_string()),
        handler_lines: body.map(|b| (b.start_position().row + 1, b.end_position().row + 1)),
        route_path,
    }
}

/// Attribute names and values of a JSX element.
fn attributes<'t>(parsed: &ParsedSource, element: Node<'t>) -> Vec<(String, AttrValue<'t>)> {
    let mut attrs = Vec::new();
    let mut cursor = element.walk();
    for attr in element.named_children(&mut cursor) {
        if attr.kind() != "jsx_attribute" {
            continue;
        }
        let Some(key) = attr.named_child(0) else {
            continue;
        };
        let key = parsed.node_text(key).to_string();
        let Some(value) = attr.named_child(1) else {
            continue;
        };

        let value = match value.kind() {
            "string" => literal_value(parsed.node_text(value)).map(AttrValue::Literal),
            "jsx_expression" => value.named_child(0).map(|inner| match inner.kind() {
                "string" | "template_string" => literal_value(parsed.node_text(inner))
                    .map(AttrValue::Literal)
                    .unwrap_or(AttrValue::Expr(inner)),
                _ => AttrValue::Expr(inner),
            }),
            _ => None,
        };
        if let Some(value) = value {
            attrs.push((key, value));
        }
    }
    attrs
}

/// Literal text directly inside an element, whitespace collapsed.
fn text_content(parsed: &ParsedSource, element: Node) -> Option<String> {
    if element.kind() != "jsx_opening_element" {
        return None;
    }
    let parent = element.parent()?;
    let mut cursor = parent.walk();
    let text: Vec<&str> = parent
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "jsx_text")
        .flat_map(|c| parsed.node_text(c).split_whitespace())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join(" "))
    }
}

/// Body text without enclosing braces.
fn body_text(parsed: &ParsedSource, body: Node) -> String {
    let text = parsed.node_text(body);
    if body.kind() == "statement_block" {
        text.strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(text)
            .to_string()
    } else {
        text.to_string()
    }
}

/// Function bodies by binding name, first declaration wins.
fn local_handlers<'t>(parsed: &'t ParsedSource) -> HashMap<String, Node<'t>> {
    let mut map = HashMap::new();
    visit(parsed.root(), &mut |node| {
        let found = match node.kind() {
            "function_declaration" => node
                .child_by_field_name("name")
                .zip(node.child_by_field_name("body")),
            "variable_declarator" => node
                .child_by_field_name("name")
                .zip(node.child_by_field_name("value").and_then(|v| function_body(parsed, v))),
            _ => None,
        };
        if let Some((name, body)) = found {
            map.entry(parsed.node_text(name).to_string()).or_insert(body);
        }
    });
    map
}

/// Body of a function value, looking through `useCallback(fn, deps)`.
fn function_body<'t>(parsed: &ParsedSource, value: Node<'t>) -> Option<Node<'t>> {
    match value.kind() {
        "arrow_function" | "function_expression" | "function" => value.child_by_field_name("body"),
        "call_expression" => {
            let callee = parsed.node_text(value.child_by_field_name("function")?);
            if callee != "useCallback" && callee != "React.useCallback" {
                return None;
            }
            let first = value.child_by_field_name("arguments")?.named_child(0)?;
            function_body(parsed, first)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn extract(rel: &str, content: &str) -> Vec<UiActionNode> {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        let ctx = ExtractContext::new(
            PathBuf::from(temp.path()),
            vec![FileEntry {
                path,
                rel_path: rel.to_string(),
                extension: rel.rsplit('.').next().unwrap().to_string(),
                is_migration: false,
            }],
        );
        let mut graph = AppGraph::new();
        UiActionExtractor.extract(&ctx, &mut graph);
        let mut nodes: Vec<_> = graph.ui_actions().cloned().collect();
        nodes.sort_by_key(|n| n.line);
        nodes
    }

    #[test]
    fn test_console_only_button() {
        let nodes = extract(
            "app/checkout/page.tsx",
            r#""use client";
export default function Checkout() {
  return (
    <div>
      <button onClick={() => console.log("clicked")}>Pay now</button>
    </div>
  );
}
"#,
        );
        assert_eq!(nodes.len(), 1);
        let button = &nodes[0];
        assert_eq!(button.element, "button");
        assert_eq!(button.label.as_deref(), Some("Pay now"));
        assert_eq!(button.suspicious, Some(true));
        assert_eq!(button.suspicion.as_deref(), Some("console-only"));
        assert_eq!(button.route_path.as_deref(), Some("/checkout"));
        assert_eq!(button.line, Some(5));
        assert_eq!(button.id, "ui_action:app/checkout/page.tsx:5:7:button");
    }

    #[test]
    fn test_resolves_named_handlers() {
        let nodes = extract(
            "components/Toolbar.tsx",
            r#"export function Toolbar() {
  const handleExport = useCallback(() => {
    // TODO wire up export
  }, []);
  function handleSave() {
    save(doc);
  }
  return (
    <>
      <Button aria-label="Export" onClick={handleExport}>Export CSV</Button>
      <Button onClick={handleSave} title="Save">Save</Button>
      <IconButton onClick={props.onClose} />
    </>
  );
}
"#,
        );
        assert_eq!(nodes.len(), 3);

        let export = &nodes[0];
        assert_eq!(export.label.as_deref(), Some("Export"));
        assert_eq!(export.handler_name.as_deref(), Some("handleExport"));
        // Comment-only body is empty once comments are stripped
        assert_eq!(export.suspicion.as_deref(), Some("empty-body"));
        assert_eq!(export.handler_lines, Some((2, 4)));

        let save = &nodes[1];
        assert_eq!(save.label.as_deref(), Some("Save"));
        assert_eq!(save.suspicious, Some(false));
        assert_eq!(save.handler_lines, Some((5, 7)));
        assert_eq!(save.route_path, None);

        let close = &nodes[2];
        assert_eq!(close.handler_name.as_deref(), Some("props.onClose"));
        assert_eq!(close.suspicious, None);
    }

    #[test]
    fn test_links_and_forms() {
        let nodes = extract(
            "app/page.tsx",
            r#"export default function Home() {
  return (
    <main>
      <Link href="/orders">Orders</Link>
      <a href={`/orders/${id}`}>Latest</a>
      <form action="/api/subscribe" method="post"><input name="email" /></form>
      <div onClick={() => {}}>not interactive</div>
    </main>
  );
}
"#,
        );
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].element, "Link");
        assert_eq!(nodes[0].href.as_deref(), Some("/orders"));
        assert_eq!(nodes[0].suspicious, None);
        assert_eq!(nodes[1].href.as_deref(), Some("/orders/*"));
        assert_eq!(nodes[2].element, "form");
        assert_eq!(nodes[2].href.as_deref(), Some("/api/subscribe"));
        assert!(nodes.iter().all(|n| n.route_path.as_deref() == Some("/")));
    }

    #[test]
    fn test_plain_ts_files_skipped() {
        let nodes = extract("lib/util.ts", "export const x = 1;\n");
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify_handler(""), Some(Suspicion::EmptyBody));
        assert_eq!(classify_handler("  // nothing yet\n"), Some(Suspicion::EmptyBody));
        assert_eq!(classify_handler(";"), Some(Suspicion::BareSemicolon));
        assert_eq!(
            classify_handler("console.log('a');\nconsole.warn('b')"),
            Some(Suspicion::ConsoleOnly)
        );
        assert_eq!(
            classify_handler("toast.success(\"Coming soon!\")"),
            Some(Suspicion::NotificationOnly)
        );
        assert_eq!(classify_handler("alert('hi');"), Some(Suspicion::NotificationOnly));
        assert_eq!(classify_handler("return;"), Some(Suspicion::BareReturn));
        assert_eq!(
            classify_handler("setOpen(true); // TODO: persist"),
            Some(Suspicion::StubMarker)
        );
        assert_eq!(
            classify_handler("throw new Error('Not implemented')"),
            Some(Suspicion::StubMarker)
        );
    }

    #[test]
    fn test_todo_app_handlers_are_not_stubs() {
        assert_eq!(
            classify_handler("supabase.from(\"todo\").delete().eq(\"id\", id)"),
            None
        );
        assert_eq!(classify_handler("router.push('/todo/new')"), None);
        assert_eq!(
            classify_handler("save(); // todo: debounce"),
            Some(Suspicion::StubMarker)
        );
        assert_eq!(
            classify_handler("setError('TODO: wire payments')"),
            Some(Suspicion::StubMarker)
        );
    }

    #[test]
    fn test_classify_real_handlers() {
        assert_eq!(classify_handler("setOpen(!open)"), None);
        assert_eq!(classify_handler("addTodo(todo);\nsetText('')"), None);
        assert_eq!(
            classify_handler("console.log('saving');\nawait save(data);"),
            None
        );
        assert_eq!(classify_handler("if (!ok) return;\nsubmit()"), None);
    }

    #[test]
    fn test_split_statements() {
        let parts = split_statements("a(); b({\n x: 1\n})\nc('; ')");
        assert_eq!(parts, vec!["a()", "b({\n x: 1\n})", "c('; ')"]);
    }
}
