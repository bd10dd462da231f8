//! Supabase query-builder calls.
//!
//! Scans raw text for `.from("table")` and `.rpc("fn")` accessors and
//! classifies the call chain that follows each one. The chain ends at the
//! next accessor or at the end of the statement, whichever comes first.

use regex::Regex;

use super::{balanced_end, per_file, ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, GraphNode, NodeKind, QueryOperation, SupabaseQueryNode};
use crate::index::FileEntry;
use crate::source::{column_of, line_of};

lazy_static::lazy_static! {
    static ref ACCESSOR: Regex = Regex::new(
        r#"\.\s*(from|rpc)\s*\(\s*['"`]([A-Za-z0-9_.\-]+)['"`]"#
    ).unwrap();

    static ref MUTATION: Regex =
        Regex::new(r"\.\s*(insert|upsert|update|delete)\s*\(").unwrap();

    static ref SELECT_CALL: Regex = Regex::new(r"\.\s*select\s*\(").unwrap();

    static ref PAGINATION: Regex = Regex::new(r"\.\s*(?:range|limit)\s*\(").unwrap();

    static ref SINGLE_ROW: Regex = Regex::new(r"\.\s*(?:single|maybeSingle)\s*\(").unwrap();

    static ref HEAD_ONLY: Regex = Regex::new(r"\bhead\s*:\s*true\b").unwrap();
}

/// Receivers whose `.from("...")` is not a table accessor. `storage`
/// covers `supabase.storage.from("bucket")`.
const NON_QUERY_RECEIVERS: &[&str] = &["Array", "Buffer", "Uint8Array", "Object", "storage"];

pub struct SupabaseQueryExtractor;

impl Extractor for SupabaseQueryExtractor {
    fn name(&self) -> &'static str {
        "supabase-queries"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let nodes = per_file(ctx.source_files(), |file| queries_in_file(ctx, file));
        graph.extend_nodes(nodes);
    }
}

struct Accessor<'t> {
    start: usize,
    end: usize,
    is_rpc: bool,
    name: &'t str,
}

fn queries_in_file(ctx: &ExtractContext, file: &FileEntry) -> Vec<GraphNode> {
    let Some(text) = ctx.sources.text(&file.path) else {
        return Vec::new();
    };
    if !text.contains(".from(") && !text.contains(".rpc(") {
        return Vec::new();
    }

    let accessors: Vec<Accessor> = ACCESSOR
        .captures_iter(&text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if has_non_query_receiver(&text, whole.start()) {
                return None;
            }
            let open = whole.start() + whole.as_str().find('(')?;
            Some(Accessor {
                start: whole.start(),
                end: balanced_end(&text, open),
                is_rpc: caps.get(1)?.as_str() == "rpc",
                name: caps.get(2)?.as_str(),
            })
        })
        .collect();
    if accessors.is_empty() {
        return Vec::new();
    }

    let is_client = ctx.sources.boundary(file).is_client();
    let mut nodes = Vec::with_capacity(accessors.len());

    for (i, accessor) in accessors.iter().enumerate() {
        let next = accessors.get(i + 1).map(|a| a.start).unwrap_or(text.len());
        let end = chain_end(&text, accessor.end).min(next);
        let chain = &text[accessor.end..end.max(accessor.end)];

        let operation = if accessor.is_rpc {
            QueryOperation::Rpc
        } else {
            classify_chain(chain)
        };
        let facts = if operation == QueryOperation::Select {
            Some(select_facts(chain))
        } else {
            None
        };

        // Report the position of the method name, not the dot
        let pos = text[accessor.start..]
            .find(|c: char| c.is_ascii_alphabetic())
            .map(|o| accessor.start + o)
            .unwrap_or(accessor.start);
        let line = line_of(&text, pos);
        let col = column_of(&text, pos);

        nodes.push(GraphNode::SupabaseQuery(SupabaseQueryNode {
            id: node_id(
                NodeKind::SupabaseQuery,
                &[
                    &file.rel_path,
                    &format!("{}:{}", line, col),
                    accessor.name,
                    operation.as_str(),
                ],
            ),
            file_path: file.rel_path.clone(),
            line: Some(line),
            table: accessor.name.to_string(),
            operation,
            has_pagination: facts.as_ref().map(|f| f.has_pagination),
            select_all: facts.as_ref().and_then(|f| f.select_all),
            is_client,
            is_single_row: facts.as_ref().map(|f| f.is_single_row),
            is_count_only: facts.as_ref().map(|f| f.is_count_only),
        }));
    }

    nodes
}

fn has_non_query_receiver(text: &str, dot: usize) -> bool {
    let before = text[..dot].trim_end();
    NON_QUERY_RECEIVERS.iter().any(|r| {
        before.ends_with(r)
            && !before[..before.len() - r.len()]
                .chars()
                .last()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false)
    })
}

/// Classify the chained call following a `.from(...)` accessor.
fn classify_chain(chain: &str) -> QueryOperation {
    match MUTATION
        .captures(chain)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    {
        Some("insert") => QueryOperation::Insert,
        Some("upsert") => QueryOperation::Upsert,
        Some("update") => QueryOperation::Update,
        Some("delete") => QueryOperation::Delete,
        _ => QueryOperation::Select,
    }
}

struct SelectFacts {
    has_pagination: bool,
    select_all: Option<bool>,
    is_single_row: bool,
    is_count_only: bool,
}

fn select_facts(chain: &str) -> SelectFacts {
    let select_all = SELECT_CALL.find(chain).map(|m| {
        let open = m.end() - 1;
        let call = &chain[m.end()..balanced_end(chain, open)];
        // An unbalanced call runs to the end of the chain
        let args = call.strip_suffix(')').unwrap_or(call);
        let first = first_argument(args);
        let column_list = first.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
        first.is_empty() || column_list == "*"
    });

    SelectFacts {
        has_pagination: PAGINATION.is_match(chain),
        select_all,
        is_single_row: SINGLE_ROW.is_match(chain),
        is_count_only: HEAD_ONLY.is_match(chain),
    }
}

/// Text of the first top-level argument in an argument list.
fn first_argument(args: &str) -> &str {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in args.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => return args[..i].trim(),
                _ => {}
            },
        }
    }
    args.trim()
}

/// End of the statement containing a call chain starting at `from`.
///
/// Stops at a top-level `;`, at a closing bracket that leaves the enclosing
/// expression, or at a top-level line break not followed by a `.`
/// continuation.
fn chain_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return i;
                }
            }
            b';' if depth == 0 => return i,
            b'\n' if depth == 0 => {
                let rest = text[i..].trim_start();
                if !rest.starts_with('.') {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    text.len()
}
