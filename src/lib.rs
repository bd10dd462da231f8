//! Readycheck - production-readiness gate for Next.js + Supabase apps.
//!
//! A scan builds an in-memory graph of the application and runs a catalog
//! of rules over it:
//!
//! - `index`: walks the project and classifies source and migration files
//! - `source`: cached reads, tree-sitter parses and client/server boundaries
//! - `extract`: one extractor per node kind (routes, UI actions, endpoints,
//!   callsites, Supabase queries, migrations, env vars)
//! - `link`: derives every edge once all nodes exist
//! - `rules`: the rule engine and built-in catalog
//! - `baseline`: accepted findings, matched by fingerprint
//! - `report`: the validation context in JSON and Markdown
//! - `scan`: the orchestrator tying the stages together
//!
//! # Adding a Rule
//!
//! Implement `rules::Rule` and register it on a `RuleRegistry`. Rules read
//! the graph only; anything they need must already be a node field or an
//! edge.

pub mod baseline;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod index;
pub mod link;
pub mod report;
pub mod router;
pub mod rules;
pub mod scan;
pub mod source;

pub use baseline::{is_suppressed, Baseline, BaselineEntry};
pub use config::Config;
pub use error::ScanError;
pub use graph::{AppGraph, EdgeKind, GraphNode, NodeKind};
pub use report::{OutputFormat, ValidationContext};
pub use rules::{Finding, Rule, RuleRegistry, Severity};
pub use scan::{ScanOutcome, Scanner};
