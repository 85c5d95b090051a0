//! Document-level checks
//!
//! These assert things about the contract itself, independent of any
//! live response.

use serde_json::Value;

use crate::consistency::Discrepancy;
use crate::document::SwaggerDocument;
use crate::fragment::Shape;
use crate::verdict::{DocumentCheck, Severity};

/// Structural subset of the Swagger 2.0 schema.
const SWAGGER_SHAPE: &str = include_str!("swagger_shape.json");

/// Violations reported per check before truncating.
const MAX_DETAILS: usize = 20;

pub const VALID_SWAGGER: &str = "valid_swagger";
pub const MODELS_FOR_GET_ENDPOINTS: &str = "models_for_get_endpoints";
pub const CONSISTENT_WITH_MASTER: &str = "consistent_with_master";

/// The raw document conforms to the Swagger 2.0 structure.
#[must_use]
pub fn check_valid_swagger(raw: &Value) -> DocumentCheck {
    let description = "document is a valid Swagger 2.0 document";
    let shape: Value = match serde_json::from_str(SWAGGER_SHAPE) {
        Ok(v) => v,
        Err(e) => {
            return DocumentCheck::fail(
                VALID_SWAGGER,
                description,
                Severity::Error,
                vec![format!("bundled Swagger schema is unreadable: {e}")],
            );
        }
    };
    let validator = match jsonschema::validator_for(&shape) {
        Ok(v) => v,
        Err(e) => {
            return DocumentCheck::fail(
                VALID_SWAGGER,
                description,
                Severity::Error,
                vec![format!("bundled Swagger schema is invalid: {e}")],
            );
        }
    };
    let details: Vec<String> = validator
        .iter_errors(raw)
        .take(MAX_DETAILS)
        .map(|e| e.to_string())
        .collect();
    DocumentCheck::from_details(VALID_SWAGGER, description, Severity::Error, details)
}

/// Every `get` operation declaring `200` references a model: the schema is a
/// `$ref`, or an array whose items are a `$ref`.
#[must_use]
pub fn check_models_for_get_endpoints(document: &SwaggerDocument) -> DocumentCheck {
    let offenders: Vec<String> = document
        .produce_responses()
        .filter(|case| case.method == "get" && case.code == "200")
        .filter(|case| !references_model(case.fragment.map(|f| &f.shape)))
        .map(|case| format!("GET {}", case.path))
        .collect();
    DocumentCheck::from_details(
        MODELS_FOR_GET_ENDPOINTS,
        "every GET endpoint with a 200 response has a referenced model",
        Severity::Error,
        offenders,
    )
}

fn references_model(shape: Option<&Shape>) -> bool {
    match shape {
        Some(Shape::Ref(_)) => true,
        Some(Shape::Array(items)) => matches!(items.shape, Shape::Ref(_)),
        _ => false,
    }
}

/// Advisory result of comparing against the master document.
#[must_use]
pub fn check_consistency(discrepancies: &[Discrepancy]) -> DocumentCheck {
    DocumentCheck::from_details(
        CONSISTENT_WITH_MASTER,
        "shared models match the master document",
        Severity::Warning,
        discrepancies.iter().map(ToString::to_string).collect(),
    )
}

/// The checks every run performs on the local document.
#[must_use]
pub fn run_audits(document: &SwaggerDocument) -> Vec<DocumentCheck> {
    vec![
        check_valid_swagger(document.raw()),
        check_models_for_get_endpoints(document),
    ]
}
