//! Scanner configuration.
//!
//! Configuration lives in an optional `readycheck.yaml` at the project
//! root. Every key is optional; unset keys fall back to the defaults below,
//! and command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rules::Severity;

/// Config file names searched for in the project root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["readycheck.yaml", "readycheck.yml", ".readycheck.yaml"];

/// Output directory used when neither the config nor the CLI names one.
pub const DEFAULT_OUTPUT_DIR: &str = ".readycheck";

/// Default include globs for source files.
pub const DEFAULT_INCLUDE: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.mts", "**/*.cts",
];

/// Directory names that are never walked.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    ".vercel",
    ".turbo",
    ".svelte-kit",
    "dist",
    "build",
    "out",
    "coverage",
    DEFAULT_OUTPUT_DIR,
];

/// Name prefixes that mark an environment variable as intentionally public.
pub const DEFAULT_PUBLIC_ENV_PREFIXES: &[&str] =
    &["NEXT_PUBLIC_", "VITE_", "PUBLIC_", "EXPO_PUBLIC_", "REACT_APP_"];

/// Example env files loaded (when present) to check documentation.
pub const DEFAULT_ENV_EXAMPLE_FILES: &[&str] = &[
    ".env.example",
    ".env.sample",
    ".env.local.example",
    ".env.template",
];

/// Template written by `readycheck init`.
pub const TEMPLATE: &str = include_str!("templates/readycheck.yaml");

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid {field} pattern {pattern:?}: {source}")]
    Glob {
        field: &'static str,
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Top-level scanner configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Glob patterns selecting source files (relative to the project root).
    #[serde(default)]
    pub include: Vec<String>,
    /// Extra directory names to skip, on top of the built-in list.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns for relative paths to skip (e.g., "scripts/**").
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// Replaces the built-in public env prefixes when non-empty.
    #[serde(default)]
    pub public_env_prefixes: Vec<String>,
    /// Replaces the built-in example env file names when non-empty.
    #[serde(default)]
    pub env_example_files: Vec<String>,
    /// Lowest severity that fails the gate.
    #[serde(default)]
    pub fail_on: Option<Severity>,
    /// Rule ids that are not evaluated.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// Report directory, relative to the project root.
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    /// Find a config file in the project root.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Load the explicit config, or the discovered one, or defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(root),
        };
        let config = match path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Self::parse_file(&p)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every include glob compiles. Broken `exclude_paths`
    /// entries are only warned about when the index is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.include {
            globset::Glob::new(pattern).map_err(|source| ConfigError::Glob {
                field: "include",
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Include globs, falling back to the defaults.
    pub fn include_patterns(&self) -> Vec<String> {
        if self.include.is_empty() {
            DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect()
        } else {
            self.include.clone()
        }
    }

    /// Built-in excluded directory names plus configured ones.
    pub fn excluded_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect();
        if let Some(out) = &self.output_dir {
            if let Some(name) = Path::new(out).file_name() {
                dirs.push(name.to_string_lossy().to_string());
            }
        }
        for d in &self.exclude_dirs {
            if !dirs.contains(d) {
                dirs.push(d.clone());
            }
        }
        dirs
    }

    pub fn public_prefixes(&self) -> Vec<String> {
        if self.public_env_prefixes.is_empty() {
            DEFAULT_PUBLIC_ENV_PREFIXES.iter().map(|s| s.to_string()).collect()
        } else {
            self.public_env_prefixes.clone()
        }
    }

    pub fn env_example_files(&self) -> Vec<String> {
        if self.env_example_files.is_empty() {
            DEFAULT_ENV_EXAMPLE_FILES.iter().map(|s| s.to_string()).collect()
        } else {
            self.env_example_files.clone()
        }
    }

    /// Gate threshold (defaults to CRITICAL).
    pub fn fail_on(&self) -> Severity {
        self.fail_on.unwrap_or_default()
    }

    pub fn output_dir(&self) -> &str {
        self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)
    }

    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        !self.disabled_rules.iter().any(|r| r == rule_id)
    }
}
