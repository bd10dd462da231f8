//! Extraction pipeline.
//!
//! Each extractor scans the indexed files and appends nodes of one kind to
//! the graph. Extractors never read each other's output, so they can run in
//! any order; per-file work runs on the rayon pool and results are inserted
//! in file order, which keeps id collisions deterministic.
//!
//! All pattern matching uses `regex` iterators created per call, so no
//! search position survives from one file to the next.

mod callsites;
mod endpoints;
mod env;
mod migrations;
mod routes;
mod supabase;
mod ui_actions;

pub use callsites::CallsiteExtractor;
pub use endpoints::EndpointExtractor;
pub use env::{load_env_example, parse_env_example, EnvExtractor};
pub use migrations::MigrationExtractor;
pub use routes::RouteExtractor;
pub use supabase::SupabaseQueryExtractor;
pub use ui_actions::{classify_handler, Suspicion, UiActionExtractor};

use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::graph::{AppGraph, GraphNode};
use crate::index::FileEntry;
use crate::source::SourceCache;

/// Shared, read-only inputs for every extractor.
pub struct ExtractContext {
    pub root: PathBuf,
    pub files: Vec<FileEntry>,
    pub sources: SourceCache,
    /// Names declared in `.env.example`-style files; None when no such file
    /// exists.
    pub env_example: Option<BTreeSet<String>>,
    pub public_env_prefixes: Vec<String>,
}

impl ExtractContext {
    pub fn new(root: PathBuf, files: Vec<FileEntry>) -> Self {
        Self {
            root,
            files,
            sources: SourceCache::new(),
            env_example: None,
            public_env_prefixes: Vec::new(),
        }
    }

    pub fn with_env_example(mut self, names: Option<BTreeSet<String>>) -> Self {
        self.env_example = names;
        self
    }

    pub fn with_public_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.public_env_prefixes = prefixes;
        self
    }

    pub fn source_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| !f.is_migration)
    }

    pub fn migration_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| f.is_migration)
    }

    pub fn is_public_env(&self, name: &str) -> bool {
        self.public_env_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
    }
}

/// A producer of one node kind.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Append this extractor's nodes to the graph.
    fn extract(&self, ctx: &ExtractContext, graph: &mut AppGraph);
}

/// The built-in extractors.
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(RouteExtractor),
        Box::new(UiActionExtractor),
        Box::new(EndpointExtractor),
        Box::new(CallsiteExtractor),
        Box::new(SupabaseQueryExtractor),
        Box::new(MigrationExtractor),
        Box::new(EnvExtractor),
    ]
}

/// Run extractors in order over the context.
pub fn run_pipeline(ctx: &ExtractContext, graph: &mut AppGraph, extractors: &[Box<dyn Extractor>]) {
    for extractor in extractors {
        let before = graph.node_count();
        extractor.extract(ctx, graph);
        debug!(
            extractor = extractor.name(),
            nodes = graph.node_count() - before,
            "extraction pass complete"
        );
    }
}

/// Map files to nodes in parallel and flatten in file order.
pub(crate) fn per_file<'a, I, F>(files: I, f: F) -> Vec<GraphNode>
where
    I: Iterator<Item = &'a FileEntry>,
    F: Fn(&FileEntry) -> Vec<GraphNode> + Sync + Send,
{
    let files: Vec<&FileEntry> = files.collect();
    files
        .par_iter()
        .map(|entry| f(entry))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

lazy_static::lazy_static! {
    static ref TEMPLATE_EXPR: Regex = Regex::new(r"\$\{[^}]*\}").unwrap();
}

/// Strip matching quotes from a string or template literal. Template
/// substitutions become `*`.
pub(crate) fn literal_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let first = raw.chars().next()?;
    if raw.len() < 2 || !raw.ends_with(first) {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    match first {
        '"' | '\'' => Some(inner.to_string()),
        '`' => Some(template_to_pattern(inner)),
        _ => None,
    }
}

/// Replace `${...}` substitutions with `*` and drop a leading substitution
/// that stands for an origin (`${base}/api/x` -> `/api/x`).
pub(crate) fn template_to_pattern(inner: &str) -> String {
    let replaced = TEMPLATE_EXPR.replace_all(inner, "*").to_string();
    match replaced.strip_prefix('*') {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => replaced,
    }
}

/// Byte offset just past the call whose opening parenthesis is at `open`.
/// Tracks nesting and string literals; returns the text end if unbalanced.
pub(crate) fn balanced_end(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut i = open;
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
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_value() {
        assert_eq!(literal_value("\"/api/orders\""), Some("/api/orders".into()));
        assert_eq!(literal_value("'x'"), Some("x".into()));
        assert_eq!(literal_value("`/orders/${id}`"), Some("/orders/*".into()));
        assert_eq!(literal_value("`${base}/api/x`"), Some("/api/x".into()));
        assert_eq!(literal_value("handler"), None);
        assert_eq!(literal_value("\""), None);
    }

    #[test]
    fn test_balanced_end() {
        let text = "fetch('/a', { method: ')' }) + 1";
        assert_eq!(&text[..balanced_end(text, 5)], "fetch('/a', { method: ')' })");
        assert_eq!(balanced_end("f(unclosed", 1), "f(unclosed".len());
    }

    #[test]
    fn test_public_prefixes() {
        let ctx = ExtractContext::new(PathBuf::from("."), vec![])
            .with_public_prefixes(vec!["NEXT_PUBLIC_".to_string()]);
        assert!(ctx.is_public_env("NEXT_PUBLIC_URL"));
        assert!(!ctx.is_public_env("SECRET"));
    }
}
