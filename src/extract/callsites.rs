//! HTTP, navigation and server-action callsites.

use regex::Regex;
use std::collections::BTreeMap;

use super::{balanced_end, literal_value, per_file, ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, CallsiteNode, CallsiteType, GraphNode, NodeKind};
use crate::index::FileEntry;
use crate::router::normalize_target;
use crate::source::{column_of, line_of};

/// A string or template literal as the first call argument.
const LITERAL: &str = r#"('[^'\n]*'|"[^"\n]*"|`[^`]*`)"#;

lazy_static::lazy_static! {
    static ref FETCH: Regex =
        Regex::new(&format!(r"\bfetch\s*\(\s*{LITERAL}")).unwrap();

    static ref AXIOS: Regex = Regex::new(&format!(
        r"\baxios(?:\s*\.\s*(get|post|put|patch|delete|head|options))?\s*\(\s*{LITERAL}"
    )).unwrap();

    static ref NAVIGATION: Regex = Regex::new(&format!(
        r"(?:\b(?:router|navigate)\s*\.\s*(?:push|replace|prefetch)|\b(?:redirect|permanentRedirect))\s*\(\s*{LITERAL}"
    )).unwrap();

    static ref METHOD_OPTION: Regex =
        Regex::new(r#"\bmethod\s*:\s*['"`]([A-Za-z]+)['"`]"#).unwrap();

    static ref NAMED_IMPORT: Regex = Regex::new(
        r#"\bimport\s*(?:type\s+)?(?:[A-Za-z_$][\w$]*\s*,\s*)?\{([^}]*)\}\s*from\s*['"]([^'"]*[Aa]ction[^'"]*)['"]"#
    ).unwrap();

    static ref DEFAULT_IMPORT: Regex = Regex::new(
        r#"\bimport\s+([A-Za-z_$][\w$]*)\s*(?:,\s*\{[^}]*\})?\s*from\s*['"]([^'"]*[Aa]ction[^'"]*)['"]"#
    ).unwrap();
}

pub struct CallsiteExtractor;

impl Extractor for CallsiteExtractor {
    fn name(&self) -> &'static str {
        "callsites"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let nodes = per_file(ctx.source_files(), |file| callsites_in_file(ctx, file));
        graph.extend_nodes(nodes);
    }
}

struct Site {
    offset: usize,
    call_type: CallsiteType,
    target_path: Option<String>,
    target_symbol: Option<String>,
    method: Option<String>,
}

fn callsites_in_file(ctx: &ExtractContext, file: &FileEntry) -> Vec<GraphNode> {
    let Some(text) = ctx.sources.text(&file.path) else {
        return Vec::new();
    };

    let mut sites = Vec::new();
    sites.extend(http_sites(&text));
    sites.extend(navigation_sites(&text));
    sites.extend(action_sites(&text));
    sites.sort_by_key(|s| s.offset);

    sites
        .into_iter()
        .map(|site| {
            let line = line_of(&text, site.offset);
            let col = column_of(&text, site.offset);
            let target = site
                .target_path
                .as_deref()
                .or(site.target_symbol.as_deref())
                .unwrap_or("");
            GraphNode::Callsite(CallsiteNode {
                id: node_id(
                    NodeKind::Callsite,
                    &[
                        &file.rel_path,
                        &format!("{}:{}", line, col),
                        site.call_type.as_str(),
                        target,
                    ],
                ),
                file_path: file.rel_path.clone(),
                line: Some(line),
                call_type: site.call_type,
                target_path: site.target_path,
                target_symbol: site.target_symbol,
                method: site.method,
            })
        })
        .collect()
}

/// Internal targets are reduced to a path; anything else is kept verbatim.
fn target_of(literal: &str) -> Option<String> {
    let value = literal_value(literal)?;
    Some(normalize_target(&value).unwrap_or(value))
}

fn http_sites(text: &str) -> Vec<Site> {
    let mut sites = Vec::new();

    for caps in FETCH.captures_iter(text) {
        let (Some(whole), Some(literal)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = whole.start() + whole.as_str().find('(').unwrap_or(0);
        let call = &text[open..balanced_end(text, open)];
        let method = METHOD_OPTION
            .captures(call)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase());
        sites.push(Site {
            offset: whole.start(),
            call_type: CallsiteType::Fetch,
            target_path: target_of(literal.as_str()),
            target_symbol: None,
            method,
        });
    }

    for caps in AXIOS.captures_iter(text) {
        let (Some(whole), Some(literal)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        sites.push(Site {
            offset: whole.start(),
            call_type: CallsiteType::Axios,
            target_path: target_of(literal.as_str()),
            target_symbol: None,
            method: caps.get(1).map(|m| m.as_str().to_uppercase()),
        });
    }

    sites
}

fn navigation_sites(text: &str) -> Vec<Site> {
    NAVIGATION
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Site {
                offset: whole.start(),
                call_type: CallsiteType::Router,
                target_path: target_of(caps.get(1)?.as_str()),
                target_symbol: None,
                method: None,
            })
        })
        .collect()
}

/// Local names bound by imports from action modules, mapped to the
/// exported name.
fn imported_actions(text: &str) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();

    for caps in NAMED_IMPORT.captures_iter(text) {
        let Some(list) = caps.get(1) else { continue };
        for spec in list.as_str().split(',') {
            let spec = spec.trim();
            if spec.is_empty() || spec.starts_with("type ") {
                continue;
            }
            let (exported, local) = match spec.split_once(" as ") {
                Some((e, l)) => (e.trim(), l.trim()),
                None => (spec, spec),
            };
            names.insert(local.to_string(), exported.to_string());
        }
    }

    for caps in DEFAULT_IMPORT.captures_iter(text) {
        if let Some(local) = caps.get(1) {
            names.insert(local.as_str().to_string(), "default".to_string());
        }
    }

    names
}

fn action_sites(text: &str) -> Vec<Site> {
    let mut sites = Vec::new();

    for (local, exported) in imported_actions(text) {
        let name = regex::escape(&local);
        // Calls, JSX bindings and form-state hooks
        let usage = Regex::new(&format!(
            r"(?:^|[^\w$.]){name}\s*\(|\b(?:action|formAction)\s*=\s*\{{\s*{name}\s*\}}|\b(?:useFormState|useActionState)\s*\(\s*{name}\b"
        ));
        let Ok(usage) = usage else { continue };

        for m in usage.find_iter(text) {
            // Skip declarations that shadow the import
            let before = text[..m.start()].trim_end();
            if before.ends_with("function") {
                continue;
            }
            let offset = text[m.start()..]
                .find(local.as_str())
                .map(|o| m.start() + o)
                .unwrap_or(m.start());
            sites.push(Site {
                offset,
                call_type: CallsiteType::ServerAction,
                target_path: None,
                target_symbol: Some(exported.clone()),
                method: None,
            });
        }
    }

    sites
}
