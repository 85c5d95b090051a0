//! Whole-run report: document-level checks plus per-endpoint verdicts

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Severity, Verdict};

/// A check about the document itself rather than one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentCheck {
    /// Stable identifier, e.g. `valid_swagger`
    pub name: String,
    /// What the check asserts
    pub description: String,
    pub passed: bool,
    /// Severity when failed
    pub severity: Severity,
    /// Offending items or error messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl DocumentCheck {
    #[must_use]
    pub fn pass(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            passed: true,
            severity: Severity::Info,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn fail(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        details: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            passed: false,
            severity,
            details,
        }
    }

    /// Pass when `details` is empty, fail with `severity` otherwise.
    #[must_use]
    pub fn from_details(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        details: Vec<String>,
    ) -> Self {
        if details.is_empty() {
            Self::pass(name, description)
        } else {
            Self::fail(name, description, severity, details)
        }
    }
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Counts for one report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReportSummary {
    pub endpoints: usize,
    pub passed: usize,
    pub failed: usize,
    pub checks_failed: usize,
}

/// Everything one run produced, in enumeration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub document_checks: Vec<DocumentCheck>,
    pub verdicts: Vec<Verdict>,
}

impl Report {
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let passed = self.verdicts.iter().filter(|v| v.passed()).count();
        ReportSummary {
            endpoints: self.verdicts.len(),
            passed,
            failed: self.verdicts.len() - passed,
            checks_failed: self.document_checks.iter().filter(|c| !c.passed).count(),
        }
    }

    pub fn failed_verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed())
    }

    /// Highest exit code among failed checks and verdicts; 0 when clean.
    #[must_use]
    pub fn exit_code(&self, strict: bool) -> i32 {
        let checks = self
            .document_checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.severity);
        let verdicts = self.verdicts.iter().filter_map(Verdict::severity);
        checks
            .chain(verdicts)
            .map(|s| s.exit_code(strict))
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn status(&self, strict: bool) -> VerdictStatus {
        if self.exit_code(strict) == 0 {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        }
    }

    /// Human-readable rendering for the terminal.
    #[must_use]
    pub fn to_terminal(&self, strict: bool) -> String {
        let mut lines = Vec::new();
        let summary = self.summary();

        lines.push("Document checks:".to_string());
        for check in &self.document_checks {
            let mark = if check.passed {
                "OK".to_string()
            } else {
                check.severity.as_str().to_ascii_uppercase()
            };
            lines.push(format!("  [{mark}] {}", check.description));
            for detail in &check.details {
                lines.push(format!("         {detail}"));
            }
        }

        lines.push(String::new());
        lines.push("Endpoints:".to_string());
        for verdict in &self.verdicts {
            match &verdict.failure {
                None => lines.push(format!("  [OK] {}", verdict.case.label())),
                Some(failure) => {
                    lines.push(format!(
                        "  [{}] {}",
                        failure.severity().as_str().to_ascii_uppercase(),
                        verdict.case.label()
                    ));
                    lines.push(format!("         {failure}"));
                }
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "{}: {} endpoints, {} passed, {} failed; {} document checks failed",
            self.status(strict),
            summary.endpoints,
            summary.passed,
            summary.failed,
            summary.checks_failed
        ));
        lines.join("\n")
    }
}

/// JSON Schema of the report format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Report);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
