//! Core types for rule findings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::graph::NodeKind;

/// Finding severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    /// The default gate threshold.
    #[default]
    Critical,
}

impl Severity {
    /// Every severity from most to least severe.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Ordinal position: LOW = 0 .. CRITICAL = 3.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    /// Whether this severity is at or above the threshold.
    pub fn meets(&self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!(
                "unknown severity: {} (expected CRITICAL, HIGH, MEDIUM or LOW)",
                s
            )),
        }
    }
}

/// A single reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Referenced node ids, primary node first.
    pub node_refs: Vec<String>,
    pub fingerprint: String,
}

impl Finding {
    /// Build a finding and derive its fingerprint.
    pub fn new(
        rule_id: &str,
        severity: Severity,
        message: impl Into<String>,
        node_refs: Vec<String>,
    ) -> Self {
        let fingerprint = fingerprint(rule_id, &node_refs);
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.into(),
            node_refs,
            fingerprint,
        }
    }

    /// The primary node this finding is about.
    pub fn primary_ref(&self) -> Option<&str> {
        self.node_refs.first().map(|s| s.as_str())
    }
}

/// Number of hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Node kinds whose ids embed a line and column.
const POSITIONAL_KINDS: [NodeKind; 3] =
    [NodeKind::UiAction, NodeKind::Callsite, NodeKind::SupabaseQuery];

fn is_positional(node_ref: &str) -> bool {
    let kind = node_ref.split(':').next().unwrap_or_default();
    POSITIONAL_KINDS.iter().any(|k| k.as_str() == kind)
}

/// Stable fingerprint for a rule hit: SHA-256 over the rule id, the primary
/// ref, and every later ref that carries no source position, hex encoded
/// and truncated.
///
/// Positional refs past the first are left out so that edits shifting lines
/// in another file keep the fingerprint.
pub fn fingerprint(rule_id: &str, node_refs: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.as_bytes());
    let stable = node_refs
        .iter()
        .enumerate()
        .filter(|(i, r)| *i == 0 || !is_positional(r));
    for (_, node_ref) in stable {
        hasher.update(b"\x1f");
        hasher.update(node_ref.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}

/// Order findings deterministically: most severe first, then by rule id,
/// node refs and fingerprint.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.node_refs.cmp(&b.node_refs))
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_meets_is_inclusive() {
        assert!(Severity::Critical.meets(Severity::Critical));
        assert!(Severity::High.meets(Severity::Medium));
        assert!(!Severity::Medium.meets(Severity::High));
        assert!(Severity::Low.meets(Severity::Low));
    }

    #[test]
    fn test_parse_severity() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" HIGH ".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"MEDIUM\"");
        let parsed: Severity = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(parsed, Severity::Low);
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let refs = vec!["migration:orders".to_string()];
        let a = fingerprint("missing-rls", &refs);
        let b = fingerprint("missing-rls", &refs);
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);

        assert_ne!(a, fingerprint("rls-no-policies", &refs));
        assert_ne!(a, fingerprint("missing-rls", &["migration:users".to_string()]));
    }

    #[test]
    fn test_fingerprint_ignores_secondary_positions() {
        let refs = |query: &str| {
            vec![
                "ui_action:app/checkout/page.tsx:16:7:button".to_string(),
                "endpoint:/api/orders:POST".to_string(),
                query.to_string(),
                "migration:orders".to_string(),
            ]
        };
        let before = fingerprint(
            "ui-writes-unprotected-table",
            &refs("supabase_query:app/api/orders/route.ts:6:42:orders:insert"),
        );
        let shifted = fingerprint(
            "ui-writes-unprotected-table",
            &refs("supabase_query:app/api/orders/route.ts:7:42:orders:insert"),
        );
        assert_eq!(before, shifted);

        // The primary ref and location-free refs still count
        let mut other_button = refs("supabase_query:app/api/orders/route.ts:6:42:orders:insert");
        other_button[0] = "ui_action:app/checkout/page.tsx:20:7:button".to_string();
        assert_ne!(before, fingerprint("ui-writes-unprotected-table", &other_button));
        let mut other_table = refs("supabase_query:app/api/orders/route.ts:6:42:orders:insert");
        other_table[3] = "migration:carts".to_string();
        assert_ne!(before, fingerprint("ui-writes-unprotected-table", &other_table));
    }

    #[test]
    fn test_default_severity_is_critical() {
        assert_eq!(Severity::default(), Severity::Critical);
    }

    #[test]
    fn test_sort_findings() {
        let mut findings = vec![
            Finding::new("env-undocumented", Severity::Low, "a", vec!["env_var:x".into()]),
            Finding::new("missing-rls", Severity::Critical, "b", vec!["migration:b".into()]),
            Finding::new("missing-rls", Severity::Critical, "c", vec!["migration:a".into()]),
            Finding::new("unbounded-select", Severity::Medium, "d", vec!["q".into()]),
        ];
        sort_findings(&mut findings);

        let order: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "d", "a"]);
    }
}
