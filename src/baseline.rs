//! Validation baseline: an allow-list of finding fingerprints.
//!
//! Accepted on-disk shapes:
//! - `{"version": 1, "entries": [{"fingerprint": "...", "ruleId": "...", "reason": "...", "expires": "2025-01-31"}]}`
//! - `{"fingerprints": ["..."]}`
//! - `["...", "..."]`
//!
//! A missing file is an empty baseline. An unparseable file is logged and
//! also treated as empty; a broken baseline must never hide the gate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::rules::Finding;

/// Default baseline file name, looked up in the project root.
pub const BASELINE_FILE: &str = "validation-baseline.json";

/// Version written by `readycheck baseline`.
pub const BASELINE_VERSION: u32 = 1;

/// One accepted finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineEntry {
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Last day on which the entry still suppresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,
}

impl BaselineEntry {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            rule_id: None,
            reason: None,
            expires: None,
        }
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires.map(|d| d < today).unwrap_or(false)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaselineFile {
    Versioned {
        entries: Vec<BaselineEntry>,
    },
    Fingerprints {
        fingerprints: Vec<String>,
    },
    Bare(Vec<String>),
}

#[derive(Serialize)]
struct BaselineOut<'a> {
    version: u32,
    entries: &'a [BaselineEntry],
}

/// A loaded baseline. Read-only for the duration of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    entries: BTreeMap<String, BaselineEntry>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = BaselineEntry>>(entries: I) -> Self {
        let mut baseline = Self::new();
        for entry in entries {
            baseline.entries.entry(entry.fingerprint.clone()).or_insert(entry);
        }
        baseline
    }

    /// Parse baseline JSON in any accepted shape.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let file: BaselineFile = serde_json::from_str(json)?;
        let entries = match file {
            BaselineFile::Versioned { entries } => entries,
            BaselineFile::Fingerprints { fingerprints } | BaselineFile::Bare(fingerprints) => {
                fingerprints.into_iter().map(BaselineEntry::new).collect()
            }
        };
        Ok(Self::from_entries(entries))
    }

    /// Load a baseline file. Never fails: problems yield an empty baseline.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no baseline file");
                return Self::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read baseline, ignoring it");
                return Self::new();
            }
        };
        match Self::parse(&content) {
            Ok(baseline) => {
                debug!(path = %path.display(), entries = baseline.len(), "loaded baseline");
                baseline
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparseable baseline, ignoring it");
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&BaselineEntry> {
        self.entries.get(fingerprint)
    }

    /// Whether an unexpired entry covers the fingerprint.
    pub fn suppresses(&self, fingerprint: &str, today: NaiveDate) -> bool {
        self.entries
            .get(fingerprint)
            .map(|e| !e.is_expired(today))
            .unwrap_or(false)
    }

    /// Baseline accepting every given finding. Reasons and expiry dates of
    /// entries already present in `previous` are kept; `reason` fills the
    /// rest.
    pub fn from_findings(findings: &[Finding], previous: &Baseline, reason: Option<&str>) -> Self {
        let entries = findings.iter().map(|f| match previous.get(&f.fingerprint) {
            Some(old) => BaselineEntry {
                fingerprint: f.fingerprint.clone(),
                rule_id: Some(f.rule_id.clone()),
                reason: old.reason.clone().or_else(|| reason.map(String::from)),
                expires: old.expires,
            },
            None => BaselineEntry {
                fingerprint: f.fingerprint.clone(),
                rule_id: Some(f.rule_id.clone()),
                reason: reason.map(String::from),
                expires: None,
            },
        });
        Self::from_entries(entries)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let entries: Vec<BaselineEntry> = self.entries.values().cloned().collect();
        serde_json::to_string_pretty(&BaselineOut {
            version: BASELINE_VERSION,
            entries: &entries,
        })
    }

    /// Write the baseline in the versioned shape, replacing the file
    /// atomically.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        crate::report::write_atomic(path, format!("{}\n", json).as_bytes())
    }
}

/// Whether the baseline suppresses this finding today.
pub fn is_suppressed(finding: &Finding, baseline: &Baseline) -> bool {
    baseline.suppresses(&finding.fingerprint, chrono::Local::now().date_naive())
}
