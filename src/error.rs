//! Fatal scan errors.
//!
//! Anything recoverable (an unreadable subdirectory, an unparseable file, a
//! missing baseline) is logged and skipped where it happens. Only the cases
//! below abort a scan.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read project root {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("project root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("writing report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
