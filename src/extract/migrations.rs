//! SQL migration replay.
//!
//! Migrations are replayed in path order over a table catalog, so the
//! resulting facts describe the schema after the last migration rather than
//! any single file.

use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use super::{ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, GraphNode, MigrationNode, NodeKind};

const IDENT: &str = r#"((?:"[^"]+"|[A-Za-z_][\w$]*)(?:\s*\.\s*(?:"[^"]+"|[A-Za-z_][\w$]*))?)"#;
const NAME: &str = r#"(?:"[^"]+"|[A-Za-z_][\w$]*)"#;

lazy_static::lazy_static! {
    static ref LINE_COMMENT: Regex = Regex::new(r"--[^\n]*").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();

    static ref CREATE_TABLE: Regex = Regex::new(&format!(
        r"(?i)\bcreate\s+(?:unlogged\s+)?table\s+(?:if\s+not\s+exists\s+)?{IDENT}"
    )).unwrap();
    static ref ENABLE_RLS: Regex = Regex::new(&format!(
        r"(?i)\balter\s+table\s+(?:if\s+exists\s+)?(?:only\s+)?{IDENT}\s+enable\s+row\s+level\s+security"
    )).unwrap();
    static ref DISABLE_RLS: Regex = Regex::new(&format!(
        r"(?i)\balter\s+table\s+(?:if\s+exists\s+)?(?:only\s+)?{IDENT}\s+disable\s+row\s+level\s+security"
    )).unwrap();
    static ref CREATE_POLICY: Regex = Regex::new(&format!(
        r"(?i)\bcreate\s+policy\s+{NAME}\s+on\s+{IDENT}"
    )).unwrap();
    static ref DROP_POLICY: Regex = Regex::new(&format!(
        r"(?i)\bdrop\s+policy\s+(?:if\s+exists\s+)?{NAME}\s+on\s+{IDENT}"
    )).unwrap();
    static ref CREATE_INDEX: Regex = Regex::new(&format!(
        r"(?i)\bcreate\s+(?:unique\s+)?index\s+(?:concurrently\s+)?(?:if\s+not\s+exists\s+)?(?:{NAME}\s+)?on\s+(?:only\s+)?{IDENT}"
    )).unwrap();
    static ref DROP_TABLE: Regex = Regex::new(
        r"(?i)\bdrop\s+table\s+(?:if\s+exists\s+)?([^;]+)"
    ).unwrap();
    static ref TRUNCATE: Regex = Regex::new(&format!(
        r"(?i)\btruncate\s+(?:table\s+)?(?:only\s+)?{IDENT}"
    )).unwrap();
    static ref DROP_COLUMN: Regex = Regex::new(&format!(
        r"(?i)\balter\s+table\s+(?:if\s+exists\s+)?(?:only\s+)?{IDENT}\s[^;]*?\bdrop\s+column\b"
    )).unwrap();
    static ref RENAME_TABLE: Regex = Regex::new(&format!(
        r"(?i)\balter\s+table\s+(?:if\s+exists\s+)?(?:only\s+)?{IDENT}\s+rename\s+to\s+{IDENT}"
    )).unwrap();

    static ref DROP_MODIFIERS: Regex = Regex::new(r"(?i)\s+(?:cascade|restrict)\s*$").unwrap();
}

/// One schema change, in statement order.
#[derive(Debug, Clone, PartialEq)]
enum SchemaEvent {
    CreateTable(String),
    EnableRls(String),
    DisableRls(String),
    CreatePolicy(String),
    DropPolicy(String),
    CreateIndex(String),
    DropTable(String),
    Truncate(String),
    DropColumn(String),
    Rename { from: String, to: String },
}

impl SchemaEvent {
    fn is_destructive(&self) -> bool {
        matches!(
            self,
            SchemaEvent::DropTable(_) | SchemaEvent::Truncate(_) | SchemaEvent::DropColumn(_)
        )
    }
}

#[derive(Debug, Clone)]
struct TableState {
    first_file: String,
    created: bool,
    rls_enabled: bool,
    policies: usize,
    has_index: bool,
    destructive: bool,
}

impl TableState {
    fn new(file: &str) -> Self {
        Self {
            first_file: file.to_string(),
            created: false,
            rls_enabled: false,
            policies: 0,
            has_index: false,
            destructive: false,
        }
    }
}

/// Table catalog built by replaying migrations.
#[derive(Debug, Default)]
struct Catalog {
    tables: BTreeMap<String, TableState>,
}

impl Catalog {
    fn table(&mut self, name: &str, file: &str) -> &mut TableState {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| TableState::new(file))
    }

    fn apply(&mut self, event: &SchemaEvent, file: &str) {
        match event {
            SchemaEvent::CreateTable(t) => self.table(t, file).created = true,
            SchemaEvent::EnableRls(t) => self.table(t, file).rls_enabled = true,
            SchemaEvent::DisableRls(t) => self.table(t, file).rls_enabled = false,
            SchemaEvent::CreatePolicy(t) => self.table(t, file).policies += 1,
            SchemaEvent::DropPolicy(t) => {
                let state = self.table(t, file);
                state.policies = state.policies.saturating_sub(1);
            }
            SchemaEvent::CreateIndex(t) => self.table(t, file).has_index = true,
            SchemaEvent::DropTable(t) => {
                self.tables.remove(t);
            }
            SchemaEvent::Truncate(t) | SchemaEvent::DropColumn(t) => {
                self.table(t, file).destructive = true
            }
            SchemaEvent::Rename { from, to } => {
                if let Some(state) = self.tables.remove(from) {
                    self.tables.insert(to.clone(), state);
                }
            }
        }
    }
}

/// Remove `--` and `/* */` comments.
fn strip_comments(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, " ");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Unquote an identifier, fold unquoted parts to lowercase and drop the
/// `public.` schema.
pub(crate) fn normalize_table(raw: &str) -> String {
    let parts: Vec<String> = raw
        .split('.')
        .map(|p| {
            let p = p.trim();
            match p.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                Some(quoted) => quoted.to_string(),
                None => p.to_lowercase(),
            }
        })
        .collect();
    match parts.as_slice() {
        [schema, table] if schema == "public" => table.clone(),
        _ => parts.join("."),
    }
}

/// Parse one migration into ordered schema events.
fn parse_events(sql: &str) -> Vec<SchemaEvent> {
    let sql = strip_comments(sql);
    let mut events: Vec<(usize, SchemaEvent)> = Vec::new();

    let single: [(&Regex, fn(String) -> SchemaEvent); 8] = [
        (&*CREATE_TABLE, SchemaEvent::CreateTable),
        (&*ENABLE_RLS, SchemaEvent::EnableRls),
        (&*DISABLE_RLS, SchemaEvent::DisableRls),
        (&*CREATE_POLICY, SchemaEvent::CreatePolicy),
        (&*DROP_POLICY, SchemaEvent::DropPolicy),
        (&*CREATE_INDEX, SchemaEvent::CreateIndex),
        (&*TRUNCATE, SchemaEvent::Truncate),
        (&*DROP_COLUMN, SchemaEvent::DropColumn),
    ];
    for (pattern, make) in single {
        for caps in pattern.captures_iter(&sql) {
            if let (Some(whole), Some(ident)) = (caps.get(0), caps.get(1)) {
                events.push((whole.start(), make(normalize_table(ident.as_str()))));
            }
        }
    }

    for caps in RENAME_TABLE.captures_iter(&sql) {
        if let (Some(whole), Some(from), Some(to)) = (caps.get(0), caps.get(1), caps.get(2)) {
            events.push((
                whole.start(),
                SchemaEvent::Rename {
                    from: normalize_table(from.as_str()),
                    to: normalize_table(to.as_str()),
                },
            ));
        }
    }

    for caps in DROP_TABLE.captures_iter(&sql) {
        if let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) {
            let list = DROP_MODIFIERS.replace(list.as_str().trim(), "");
            for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                events.push((whole.start(), SchemaEvent::DropTable(normalize_table(name))));
            }
        }
    }

    events.sort_by_key(|(pos, _)| *pos);
    events.into_iter().map(|(_, e)| e).collect()
}

pub struct MigrationExtractor;

impl Extractor for MigrationExtractor {
    fn name(&self) -> &'static str {
        "migrations"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let mut catalog = Catalog::default();
        let mut destructive_files = Vec::new();

        for file in ctx.migration_files() {
            let Some(sql) = ctx.sources.text(&file.path) else {
                continue;
            };
            let events = parse_events(&sql);
            debug!(file = %file.rel_path, statements = events.len(), "replaying migration");

            if events.iter().any(SchemaEvent::is_destructive) {
                destructive_files.push(file.rel_path.clone());
            }
            for event in &events {
                catalog.apply(event, &file.rel_path);
            }
        }

        let mut nodes = Vec::new();
        for (table, state) in catalog.tables {
            // Tables managed outside these migrations (e.g. storage.objects)
            if !state.created {
                continue;
            }
            nodes.push(GraphNode::Migration(MigrationNode {
                id: node_id(NodeKind::Migration, &[&table]),
                file_path: state.first_file,
                table: Some(table),
                rls_enabled: Some(state.rls_enabled),
                policy_count: Some(state.policies),
                has_destructive_ddl: Some(state.destructive),
                has_index: Some(state.has_index),
            }));
        }
        for rel_path in destructive_files {
            nodes.push(GraphNode::Migration(MigrationNode {
                id: node_id(NodeKind::Migration, &[&rel_path]),
                file_path: rel_path,
                table: None,
                rls_enabled: None,
                policy_count: None,
                has_destructive_ddl: Some(true),
                has_index: None,
            }));
        }
        graph.extend_nodes(nodes);
    }
}
