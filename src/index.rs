//! Project file indexing.
//!
//! Walks the project tree once and classifies each file as source or SQL
//! migration. Migrations are recognised by a fixed set of directory globs
//! and bypass the include patterns.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, ConfigError};
use crate::error::ScanError;
use crate::graph::path_key;

/// Globs identifying SQL migration files.
pub const MIGRATION_GLOBS: &[&str] = &[
    "supabase/migrations/**/*.sql",
    "migrations/**/*.sql",
    "db/migrations/**/*.sql",
    "**/migrations/*.sql",
];

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the project root, `/` separated.
    pub rel_path: String,
    /// Extension without the dot, lowercased.
    pub extension: String,
    pub is_migration: bool,
}

impl FileEntry {
    /// Base name without extension (e.g. "page" for "app/page.tsx").
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

/// Compiled include/exclude rules.
pub struct IndexOptions {
    include: GlobSet,
    exclude_paths: GlobSet,
    migrations: GlobSet,
    exclude_dirs: Vec<String>,
}

impl IndexOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            include: build_globset("include", &config.include_patterns())?,
            exclude_paths: exclude_globset(&config.exclude_paths),
            migrations: build_globset(
                "migrations",
                &MIGRATION_GLOBS.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )?,
            exclude_dirs: config.excluded_dirs(),
        })
    }

    fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }

    /// Classify a relative path: `Some(true)` for a migration, `Some(false)`
    /// for an included source file, `None` to skip.
    fn classify(&self, rel_path: &str, extension: &str) -> Option<bool> {
        if self.exclude_paths.is_match(rel_path) {
            return None;
        }
        if extension == "sql" {
            return self.migrations.is_match(rel_path).then_some(true);
        }
        if rel_path.ends_with(".d.ts") {
            return None;
        }
        self.include.is_match(rel_path).then_some(false)
    }
}

fn build_globset(field: &'static str, patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
            field,
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::Glob {
        field,
        pattern: patterns.join(", "),
        source,
    })
}

/// Exclusions only ever narrow the scan, so a broken pattern is dropped
/// with a warning.
fn exclude_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "cannot build exclude patterns, excluding nothing by path");
        GlobSet::empty()
    })
}

/// Index every source and migration file under `root`, sorted by relative
/// path.
///
/// Unreadable subdirectories are skipped; an unreadable root is an error.
pub fn index_project(root: &Path, options: &IndexOptions) -> Result<Vec<FileEntry>, ScanError> {
    let metadata = std::fs::metadata(root).map_err(|source| ScanError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| ScanError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut entries = BTreeMap::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !options.is_excluded_dir(&name)
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                // Subtree omitted, scan continues
                debug!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(r) => path_key(&r.to_string_lossy()),
            Err(_) => continue,
        };
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if let Some(is_migration) = options.classify(&rel, &extension) {
            entries.entry(rel.clone()).or_insert_with(|| FileEntry {
                path: path.to_path_buf(),
                rel_path: rel,
                extension,
                is_migration,
            });
        }
    }

    let files: Vec<FileEntry> = entries.into_values().collect();
    debug!(
        files = files.len(),
        migrations = files.iter().filter(|f| f.is_migration).count(),
        "indexed project"
    );
    Ok(files)
}
