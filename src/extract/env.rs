//! Environment-variable reads.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

use super::{per_file, ExtractContext, Extractor};
use crate::graph::{node_id, AppGraph, EnvVarNode, GraphNode, NodeKind};
use crate::index::FileEntry;
use crate::source::line_of;

lazy_static::lazy_static! {
    static ref ENV_READS: Vec<Regex> = vec![
        Regex::new(r"\bprocess\.env\.([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        Regex::new(r#"\bprocess\.env\[\s*['"`]([A-Za-z_][A-Za-z0-9_]*)['"`]\s*\]"#).unwrap(),
        Regex::new(r#"\bDeno\.env\.get\(\s*['"`]([A-Za-z_][A-Za-z0-9_]*)['"`]\s*\)"#).unwrap(),
        Regex::new(r"\bimport\.meta\.env\.([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
    ];

    static ref EXAMPLE_LINE: Regex =
        Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=").unwrap();
}

/// Names that are runtime flags rather than configuration.
const IGNORED: &[&str] = &["NODE_ENV", "MODE", "DEV", "PROD", "SSR", "BASE_URL"];

pub struct EnvExtractor;

impl Extractor for EnvExtractor {
    fn name(&self) -> &'static str {
        "env"
    }

    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph) {
        let nodes = per_file(ctx.source_files(), |file| env_reads(ctx, file));
        graph.extend_nodes(nodes);
    }
}

fn env_reads(ctx: &ExtractContext, file: &FileEntry) -> Vec<GraphNode> {
    let Some(text) = ctx.sources.text(&file.path) else {
        return Vec::new();
    };

    // First offset per name
    let mut first: HashMap<&str, usize> = HashMap::new();
    for pattern in ENV_READS.iter() {
        for caps in pattern.captures_iter(&text) {
            let Some(name) = caps.get(1) else { continue };
            if IGNORED.contains(&name.as_str()) {
                continue;
            }
            let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
            first
                .entry(name.as_str())
                .and_modify(|o| *o = (*o).min(offset))
                .or_insert(offset);
        }
    }
    if first.is_empty() {
        return Vec::new();
    }

    let is_client = ctx.sources.boundary(file).is_client();
    let mut reads: Vec<(&str, usize)> = first.into_iter().collect();
    reads.sort_by_key(|(name, offset)| (*offset, *name));

    reads
        .into_iter()
        .map(|(name, offset)| {
            GraphNode::EnvVar(EnvVarNode {
                id: node_id(NodeKind::EnvVar, &[&file.rel_path, name]),
                name: name.to_string(),
                file_path: file.rel_path.clone(),
                line: Some(line_of(&text, offset)),
                is_public: ctx.is_public_env(name),
                in_example: ctx.env_example.as_ref().map(|names| names.contains(name)),
                is_client,
            })
        })
        .collect()
}

/// Variable names declared in a dotenv-style file.
pub fn parse_env_example(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| EXAMPLE_LINE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Load every example file that exists under `root`. None when none of
/// them exists.
pub fn load_env_example(root: &Path, file_names: &[String]) -> Option<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut found = false;
    for file_name in file_names {
        let path = root.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                found = true;
                names.extend(parse_env_example(&text));
            }
            Err(e) => {
                debug!(file = %path.display(), error = %e, "env example not loaded");
            }
        }
    }
    found.then_some(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, ExtractContext) {
        let temp = TempDir::new().unwrap();
        let mut entries = Vec::new();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            entries.push(FileEntry {
                path,
                rel_path: rel.to_string(),
                extension: rel.rsplit('.').next().unwrap().to_string(),
                is_migration: false,
            });
        }
        let ctx = ExtractContext::new(PathBuf::from(temp.path()), entries)
            .with_public_prefixes(vec!["NEXT_PUBLIC_".to_string()]);
        (temp, ctx)
    }

    fn env_nodes(graph: &AppGraph) -> Vec<&EnvVarNode> {
        graph.env_vars().collect()
    }

    #[test]
    fn test_all_read_forms() {
        let (_temp, ctx) = setup(&[(
            "lib/env.ts",
            r#"const a = process.env.STRIPE_SECRET_KEY;
const b = process.env["DATABASE_URL"];
const c = Deno.env.get('SUPABASE_URL');
const d = import.meta.env.VITE_API;
const e = process.env.NODE_ENV;
"#,
        )]);
        let mut graph = AppGraph::new();
        EnvExtractor.extract(&ctx, &mut graph);

        let names: Vec<_> = env_nodes(&graph).iter().map(|n| n.name.clone()).collect();
        assert_eq!(
            names,
            vec!["DATABASE_URL", "STRIPE_SECRET_KEY", "SUPABASE_URL", "VITE_API"]
        );
        let node = graph.node("env_var:lib/env.ts:DATABASE_URL").unwrap();
        assert_eq!(node.line(), Some(2));
    }

    #[test]
    fn test_first_read_per_file_wins() {
        let (_temp, ctx) = setup(&[(
            "app/page.tsx",
            "\"use client\";\nconst x = 1;\nconst k = process.env.API_KEY;\nuse(process.env.API_KEY);\n",
        )]);
        let mut graph = AppGraph::new();
        EnvExtractor.extract(&ctx, &mut graph);

        let nodes = env_nodes(&graph);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].line, Some(3));
        assert!(nodes[0].is_client);
        assert!(!nodes[0].is_public);
        assert_eq!(nodes[0].in_example, None);
    }

    #[test]
    fn test_public_prefix_and_example() {
        let (_temp, ctx) = setup(&[(
            "lib/config.ts",
            "export const url = process.env.NEXT_PUBLIC_URL;\nexport const t = process.env.TOKEN;",
        )]);
        let example: BTreeSet<String> = ["NEXT_PUBLIC_URL".to_string()].into_iter().collect();
        let ctx = ctx.with_env_example(Some(example));

        let mut graph = AppGraph::new();
        EnvExtractor.extract(&ctx, &mut graph);

        let url = graph.env_vars().find(|n| n.name == "NEXT_PUBLIC_URL").unwrap();
        assert!(url.is_public);
        assert_eq!(url.in_example, Some(true));
        let token = graph.env_vars().find(|n| n.name == "TOKEN").unwrap();
        assert_eq!(token.in_example, Some(false));
    }

    #[test]
    fn test_parse_env_example() {
        let names = parse_env_example(
            "# comment\nSTRIPE_KEY=\nexport DATABASE_URL=postgres://x\n\n  SPACED = 1\n#OLD=1\n",
        );
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, vec!["DATABASE_URL", "SPACED", "STRIPE_KEY"]);
    }

    #[test]
    fn test_load_env_example() {
        let temp = TempDir::new().unwrap();
        let files = vec![".env.example".to_string(), ".env.sample".to_string()];
        assert!(load_env_example(temp.path(), &files).is_none());

        fs::write(temp.path().join(".env.sample"), "A=1\n").unwrap();
        let names = load_env_example(temp.path(), &files).unwrap();
        assert!(names.contains("A"));
    }
}
