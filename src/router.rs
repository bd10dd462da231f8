//! File-system router conventions.
//!
//! Maps file paths to route paths for both the app router (`app/**/page.*`,
//! `app/**/route.*`) and the pages router (`pages/**`), and matches concrete
//! URLs against dynamic route patterns.

/// Route derived from a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub path: String,
    pub is_api: bool,
    pub is_page: bool,
}

const ROUTABLE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

/// Derive the route served by a file, if it is a router entry point.
pub fn route_for_file(rel_path: &str) -> Option<RouteInfo> {
    let segments: Vec<&str> = rel_path.split('/').collect();
    let (file, dirs) = segments.split_last()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if !ROUTABLE_EXTENSIONS.contains(&ext) {
        return None;
    }

    if let Some(rest) = strip_root(dirs, "app") {
        return app_route(rest, stem);
    }
    if let Some(rest) = strip_root(dirs, "pages") {
        return pages_route(rest, stem);
    }
    None
}

/// Return the directories below `app/` or `src/app/` (likewise for pages).
fn strip_root<'a>(dirs: &'a [&'a str], root: &str) -> Option<&'a [&'a str]> {
    match dirs {
        [first, rest @ ..] if *first == root => Some(rest),
        ["src", first, rest @ ..] if *first == root => Some(rest),
        _ => None,
    }
}

fn app_route(dirs: &[&str], stem: &str) -> Option<RouteInfo> {
    let is_page = stem == "page";
    let is_handler = stem == "route";
    if !is_page && !is_handler {
        return None;
    }

    let mut parts = Vec::new();
    for dir in dirs {
        // Private folders are not routable
        if dir.starts_with('_') {
            return None;
        }
        // Route groups, intercepting segments and parallel slots
        if dir.starts_with('(') || dir.starts_with('@') {
            continue;
        }
        parts.push(*dir);
    }

    Some(RouteInfo {
        path: join_path(&parts),
        is_api: is_handler,
        is_page,
    })
}

fn pages_route(dirs: &[&str], stem: &str) -> Option<RouteInfo> {
    if stem.starts_with('_') {
        return None;
    }
    let is_api = dirs.first() == Some(&"api");

    let mut parts: Vec<&str> = dirs.to_vec();
    if stem != "index" {
        parts.push(stem);
    }

    Some(RouteInfo {
        path: join_path(&parts),
        is_api,
        is_page: !is_api,
    })
}

fn join_path(parts: &[&str]) -> String {
    format!("/{}", parts.join("/"))
}

/// Reduce a URL to its path: drop origin-relative query strings, fragments
/// and trailing slashes. Returns None for external or non-path targets.
pub fn normalize_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.starts_with('/') || raw.starts_with("//") {
        return None;
    }
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = raw[..end].trim_end_matches('/');
    if path.is_empty() {
        Some("/".to_string())
    } else {
        Some(path.to_string())
    }
}

/// Whether a concrete path (which may contain `*` wildcards from template
/// literals) matches a route pattern with `[param]`, `[...rest]` and
/// `[[...rest]]` segments.
pub fn matches_route(pattern: &str, concrete: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let con: Vec<&str> = concrete.split('/').filter(|s| !s.is_empty()).collect();
    match_segments(&pat, &con)
}

fn match_segments(pat: &[&str], con: &[&str]) -> bool {
    match (pat.split_first(), con.split_first()) {
        (None, None) => true,
        (Some((p, _)), _) if p.starts_with("[[...") => true,
        (Some((p, _)), rest) if p.starts_with("[...") => rest.is_some(),
        (Some(_), None) | (None, Some(_)) => false,
        (Some((p, prest)), Some((c, crest))) => {
            let segment_ok = *c == "*" || (p.starts_with('[') && p.ends_with(']')) || p == c;
            segment_ok && match_segments(prest, crest)
        }
    }
}
