//! Database schema rules over migration facts.

use super::{Finding, Rule, Severity};
use crate::graph::AppGraph;

/// A table whose final migrated state does not enable row-level security.
pub struct MissingRls;

impl Rule for MissingRls {
    fn id(&self) -> &'static str {
        "missing-rls"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Table created without row-level security enabled"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .migrations()
            .filter(|m| m.rls_enabled != Some(true))
            .filter_map(|m| {
                let table = m.table.as_deref()?;
                Some(self.finding(
                    format!("table \"{}\" may be exposed without row-level security", table),
                    vec![m.id.clone()],
                ))
            })
            .collect()
    }
}

/// RLS is on but no policy grants access, so every client query fails.
pub struct RlsNoPolicies;

impl Rule for RlsNoPolicies {
    fn id(&self) -> &'static str {
        "rls-no-policies"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Row-level security enabled with no policies"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .migrations()
            .filter(|m| m.rls_enabled == Some(true) && m.policy_count == Some(0))
            .filter_map(|m| {
                let table = m.table.as_deref()?;
                Some(self.finding(
                    format!(
                        "table \"{}\" has row-level security enabled but no policies; all client access is denied",
                        table
                    ),
                    vec![m.id.clone()],
                ))
            })
            .collect()
    }
}

/// A migration file that drops or truncates data.
pub struct DestructiveMigration;

impl Rule for DestructiveMigration {
    fn id(&self) -> &'static str {
        "destructive-migration"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Migration drops tables or columns, or truncates data"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .migrations()
            .filter(|m| m.table.is_none() && m.has_destructive_ddl == Some(true))
            .map(|m| {
                self.finding(
                    format!(
                        "migration {} contains destructive DDL (DROP TABLE, DROP COLUMN or TRUNCATE)",
                        m.file_path
                    ),
                    vec![m.id.clone()],
                )
            })
            .collect()
    }
}
