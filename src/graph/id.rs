//! Deterministic node identifiers.
//!
//! Ids are the join key between scans (baseline fingerprints are derived
//! from them), so they depend only on the node kind and its identifying
//! parts, never on discovery order.

use super::NodeKind;

/// Fallback key used when every part is empty.
pub const DEFAULT_KEY: &str = "default";

/// Build a node id of the form `{kind}:{part}:{part}...`.
///
/// Parts are trimmed and empty parts dropped. Whitespace inside the joined
/// key is replaced with `_`.
pub fn node_id(kind: NodeKind, parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(":");

    let key = if joined.is_empty() {
        DEFAULT_KEY.to_string()
    } else {
        joined
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect()
    };

    format!("{}:{}", kind.as_str(), key)
}

/// Normalize a relative path for use inside ids (forward slashes only).
pub fn path_key(path: &str) -> String {
    path.replace('\\', "/")
}
