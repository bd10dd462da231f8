//! Runtime boundary classification.
//!
//! Decides whether a file ships to the browser (client), runs only on the
//! server, or cannot be told apart (shared).

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::router;

/// Where a file's code executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Client,
    Server,
    Shared,
}

impl Boundary {
    pub fn is_client(&self) -> bool {
        matches!(self, Boundary::Client)
    }
}

lazy_static::lazy_static! {
    /// A directive as the first statement, after any leading comments.
    static ref DIRECTIVE: Regex = Regex::new(
        r#"^(?:\s|//[^\n]*|/\*[\s\S]*?\*/)*['"](use client|use server)['"]"#
    ).unwrap();

    static ref SERVER_ONLY_IMPORT: Regex =
        Regex::new(r#"import\s+['"]server-only['"]"#).unwrap();

    static ref BROWSER_CLIENT: Regex = Regex::new(
        r"\b(?:createBrowserClient|createClientComponentClient|createPagesBrowserClient)\s*\("
    ).unwrap();
}

/// Top-level `"use client"` / `"use server"` directive, if any.
pub fn directive(text: &str) -> Option<&str> {
    DIRECTIVE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Classify a file from its relative path and contents.
pub fn classify(rel_path: &str, text: &str) -> Boundary {
    match directive(text) {
        Some("use client") => return Boundary::Client,
        Some("use server") => return Boundary::Server,
        _ => {}
    }

    if is_server_path(rel_path) || SERVER_ONLY_IMPORT.is_match(text) {
        return Boundary::Server;
    }

    if BROWSER_CLIENT.is_match(text) {
        return Boundary::Client;
    }

    Boundary::Shared
}

fn is_server_path(rel_path: &str) -> bool {
    if let Some(route) = router::route_for_file(rel_path) {
        if route.is_api {
            return true;
        }
    }

    let segments: Vec<&str> = rel_path.split('/').collect();
    let file = segments.last().copied().unwrap_or("");
    let stem = file.split('.').next().unwrap_or("");

    if stem == "middleware" && (segments.len() == 1 || (segments.len() == 2 && segments[0] == "src")) {
        return true;
    }

    rel_path.starts_with("supabase/functions/")
        || segments[..segments.len().saturating_sub(1)]
            .iter()
            .any(|s| *s == "server")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_client_directive() {
        let text = "\"use client\";\nimport { useState } from 'react';";
        assert_eq!(classify("components/Cart.tsx", text), Boundary::Client);
    }

    #[test]
    fn test_directive_after_comments() {
        let text = "// Copyright\n/* header */\n'use client'\nexport default 1;";
        assert_eq!(directive(text), Some("use client"));
    }

    #[test]
    fn test_directive_must_come_first() {
        let text = "import x from 'y';\n\"use client\";";
        assert_eq!(directive(text), None);
        assert_eq!(classify("components/X.tsx", text), Boundary::Shared);
    }

    #[test]
    fn test_use_server_directive() {
        let text = "'use server'\nexport async function save() {}";
        assert_eq!(classify("app/actions.ts", text), Boundary::Server);
    }

    #[test]
    fn test_server_paths() {
        assert_eq!(classify("app/api/orders/route.ts", ""), Boundary::Server);
        assert_eq!(classify("pages/api/users.ts", ""), Boundary::Server);
        assert_eq!(classify("middleware.ts", ""), Boundary::Server);
        assert_eq!(classify("src/middleware.ts", ""), Boundary::Server);
        assert_eq!(classify("supabase/functions/hook/index.ts", ""), Boundary::Server);
        assert_eq!(classify("lib/server/db.ts", ""), Boundary::Server);
        assert_eq!(classify("lib/db.ts", ""), Boundary::Shared);
    }

    #[test]
    fn test_server_only_import() {
        let text = "import 'server-only';\nexport const key = 1;";
        assert_eq!(classify("lib/keys.ts", text), Boundary::Server);
    }

    #[test]
    fn test_browser_client_hint() {
        let text = "const supabase = createBrowserClient(url, key);";
        assert_eq!(classify("lib/supabase.ts", text), Boundary::Client);
        // Server markers win over the hint
        assert_eq!(classify("lib/server/supabase.ts", text), Boundary::Server);
    }
}
