//! Source access layer.
//!
//! Parses each source file once into a tree-sitter tree and hands out
//! shared handles to every extractor. Raw text and boundary classification
//! are cached alongside, so regex-based extractors never re-read files.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ FileEntry    │────▶│ SourceCache  │────▶│ ParsedSource │
//! └──────────────┘     │ (memoized)   │     │ tree + text  │
//!                      └──────────────┘     └──────────────┘
//! ```

mod boundary;

pub use boundary::{directive, Boundary};

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::index::FileEntry;

/// A parsed source file.
pub struct ParsedSource {
    /// The tree-sitter parse tree.
    pub tree: Tree,
    /// The original source text.
    pub text: Arc<String>,
    /// Path relative to the project root.
    pub rel_path: String,
    pub boundary: Boundary,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }
}

/// Grammar for a file extension; `.ts` variants use the TypeScript grammar
/// (angle-bracket casts), everything else TSX.
pub fn language_for(extension: &str) -> Language {
    match extension {
        "ts" | "mts" | "cts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        _ => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Parse source text. Returns None when no usable tree is produced.
pub fn parse_source(
    rel_path: &str,
    extension: &str,
    text: Arc<String>,
) -> Option<ParsedSource> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language_for(extension)) {
        debug!(file = rel_path, error = %e, "grammar unavailable");
        return None;
    }

    let tree = parser.parse(text.as_bytes(), None)?;
    if tree.root_node().is_error() {
        return None;
    }

    Some(ParsedSource {
        boundary: boundary::classify(rel_path, &text),
        tree,
        text,
        rel_path: rel_path.to_string(),
    })
}

/// Memoized access to file text and parse trees, keyed by absolute path.
#[derive(Default)]
pub struct SourceCache {
    texts: RwLock<HashMap<PathBuf, Option<Arc<String>>>>,
    parsed: RwLock<HashMap<PathBuf, Option<Arc<ParsedSource>>>>,
    boundaries: RwLock<HashMap<PathBuf, Boundary>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw file text. None if the file cannot be read as UTF-8.
    pub fn text(&self, path: &Path) -> Option<Arc<String>> {
        {
            let cache = self.texts.read().unwrap();
            if let Some(entry) = cache.get(path) {
                return entry.clone();
            }
        }

        let text = match std::fs::read_to_string(path) {
            Ok(t) => Some(Arc::new(t)),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        };

        let mut cache = self.texts.write().unwrap();
        cache.entry(path.to_path_buf()).or_insert(text).clone()
    }

    /// Parsed handle for a source file, parsing on first use. None for
    /// migrations and unreadable or unparseable files.
    pub fn get_source_file(&self, entry: &FileEntry) -> Option<Arc<ParsedSource>> {
        if entry.is_migration {
            return None;
        }

        {
            let cache = self.parsed.read().unwrap();
            if let Some(parsed) = cache.get(&entry.path) {
                return parsed.clone();
            }
        }

        let parsed = self
            .text(&entry.path)
            .and_then(|text| parse_source(&entry.rel_path, &entry.extension, text))
            .map(Arc::new);
        if parsed.is_none() {
            debug!(file = %entry.rel_path, "source not parseable, skipping");
        }

        let mut cache = self.parsed.write().unwrap();
        cache.entry(entry.path.clone()).or_insert(parsed).clone()
    }

    /// Boundary of a file, from its parsed handle or raw text.
    pub fn boundary(&self, entry: &FileEntry) -> Boundary {
        {
            let cache = self.boundaries.read().unwrap();
            if let Some(b) = cache.get(&entry.path) {
                return *b;
            }
        }

        let boundary = match self.get_source_file(entry) {
            Some(parsed) => parsed.boundary,
            None => self
                .text(&entry.path)
                .map(|t| boundary::classify(&entry.rel_path, &t))
                .unwrap_or(Boundary::Shared),
        };

        let mut cache = self.boundaries.write().unwrap();
        *cache.entry(entry.path.clone()).or_insert(boundary)
    }

    /// Parse every source file up front, in parallel.
    pub fn warm(&self, files: &[FileEntry]) {
        files
            .par_iter()
            .filter(|f| !f.is_migration)
            .for_each(|f| {
                self.get_source_file(f);
            });
    }

    /// Number of files with a usable parse tree.
    pub fn parsed_count(&self) -> usize {
        let cache = self.parsed.read().unwrap();
        cache.values().filter(|p| p.is_some()).count()
    }
}

/// Visit `node` and every descendant in document order.
pub fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        f(current);
        let mut cursor = current.walk();
        let children: Vec<Node<'t>> = current.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// 1-indexed line of a byte offset.
pub fn line_of(text: &str, byte: usize) -> usize {
    let end = byte.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// 1-indexed column of a byte offset.
pub fn column_of(text: &str, byte: usize) -> usize {
    let end = byte.min(text.len());
    let line_start = text.as_bytes()[..end]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    end - line_start + 1
}
