//! Severity levels for contract findings
//!
//! Severity decides the exit code of a run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finding severity, ordered from least to most serious
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational (exit 0)
    Info,
    /// Advisory: e.g. drift from the master contract (exit 0, or 1 if strict)
    Warning,
    /// Contract or configuration failure for one endpoint (exit 1)
    Error,
    /// The service could not be reached for an endpoint (exit 2)
    Critical,
}

impl Severity {
    /// Exit code contributed by a finding of this severity.
    ///
    /// Warnings only fail the run in strict mode.
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Info => 0,
            Self::Warning if strict => 1,
            Self::Warning => 0,
            Self::Error => 1,
            Self::Critical => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
