//! Inspection plan
//!
//! Describes what a check run *would* request without sending anything.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::SwaggerDocument;
use crate::path::build_path;
use crate::setup::SetupRegistry;
use crate::verdict::EndpointCase;

/// Every enumerated tuple with the request it would produce.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Base path prefixed to every request
    pub base_path: String,
    pub entries: Vec<PlanEntry>,
}

/// One planned request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanEntry {
    pub case: EndpointCase,
    /// Concrete path, including base path and query string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
    /// First placeholder without a setup value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_parameter: Option<String>,
    /// Merged setup data the endpoint would receive
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub setup: Map<String, Value>,
    /// Whether the response declares a body schema
    pub has_schema: bool,
}

impl Plan {
    #[must_use]
    pub fn build(document: &SwaggerDocument, setups: &SetupRegistry) -> Self {
        let entries = document
            .produce_responses()
            .map(|case| {
                let data = setups.resolve(case.path, case.method, case.code);
                let (request_path, missing_parameter) = match build_path(case.path, &data) {
                    Ok(built) => (Some(format!("{}{built}", document.base_path())), None),
                    Err(e) => (None, Some(e.parameter)),
                };
                PlanEntry {
                    case: EndpointCase::from(&case),
                    request_path,
                    missing_parameter,
                    setup: data.as_map().clone(),
                    has_schema: case.fragment.is_some(),
                }
            })
            .collect();
        Self {
            base_path: document.base_path().to_string(),
            entries,
        }
    }

    /// Entries whose path cannot be built.
    pub fn unbuildable(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.missing_parameter.is_some())
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();
        let blocked = self.unbuildable().count();

        lines.push(format!(
            "Plan: {} responses, {} buildable, {} missing setup data\n",
            self.entries.len(),
            self.entries.len() - blocked,
            blocked
        ));

        for entry in &self.entries {
            let schema = if entry.has_schema { "schema" } else { "no body" };
            match (&entry.request_path, &entry.missing_parameter) {
                (Some(path), _) => lines.push(format!(
                    "  {} -> {} {path} ({schema})",
                    entry.case.label(),
                    entry.case.method.to_ascii_uppercase()
                )),
                (None, Some(param)) => lines.push(format!(
                    "  {} -> missing {{{param}}}",
                    entry.case.label()
                )),
                (None, None) => lines.push(format!("  {}", entry.case.label())),
            }
        }

        lines.join("\n")
    }
}
