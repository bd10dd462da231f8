//! Environment-variable rules.

use super::{Finding, Rule, Severity};
use crate::graph::AppGraph;

/// A non-public variable read from code that ships to the browser.
pub struct SecretInClientBoundary;

impl Rule for SecretInClientBoundary {
    fn id(&self) -> &'static str {
        "secret-in-client-boundary"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Server-only environment variable read in client code"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .env_vars()
            .filter(|e| e.is_client && !e.is_public)
            .map(|e| {
                self.finding(
                    format!(
                        "{} is read in client code ({}); it is either undefined in the browser or leaked into the bundle",
                        e.name, e.file_path
                    ),
                    vec![e.id.clone()],
                )
            })
            .collect()
    }
}

/// A variable missing from the example env file.
pub struct EnvUndocumented;

impl Rule for EnvUndocumented {
    fn id(&self) -> &'static str {
        "env-undocumented"
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Environment variable not listed in .env.example"
    }

    fn evaluate(&self, graph: &AppGraph) -> Vec<Finding> {
        graph
            .env_vars()
            .filter(|e| e.in_example == Some(false))
            .map(|e| {
                self.finding(
                    format!("{} is not documented in the example env file", e.name),
                    vec![e.id.clone()],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::env;

    #[test]
    fn test_secret_in_client() {
        let mut graph = AppGraph::new();
        graph.add_node(env("components/Pay.tsx", "STRIPE_SECRET_KEY", true, None));
        graph.add_node(env("components/Pay.tsx", "NEXT_PUBLIC_STRIPE_KEY", true, None));
        graph.add_node(env("app/api/pay/route.ts", "STRIPE_SECRET_KEY", false, None));

        let findings = SecretInClientBoundary.evaluate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].node_refs,
            vec!["env_var:components/Pay.tsx:STRIPE_SECRET_KEY".to_string()]
        );
        assert!(findings[0].message.starts_with("STRIPE_SECRET_KEY"));
    }

    #[test]
    fn test_undocumented_needs_example_file() {
        let mut graph = AppGraph::new();
        graph.add_node(env("lib/a.ts", "A", false, Some(false)));
        graph.add_node(env("lib/a.ts", "B", false, Some(true)));
        graph.add_node(env("lib/a.ts", "C", false, None));

        let findings = EnvUndocumented.evaluate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
        assert!(findings[0].message.starts_with("A "));
    }
}
