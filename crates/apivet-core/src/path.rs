//! Concrete request paths from path templates

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::setup::{SubstitutionData, value_to_param_string};

/// A `{placeholder}` with no usable substitution value.
///
/// This is a test-configuration problem, not a service failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize, JsonSchema)]
#[error(
    "No substitution data found for {{{parameter}}} to test the path {path}.\n\
     Add it with a setup rule in .apivet.toml:\n  \
     [[setup]]\n  \
     path = \"{path}\"\n  \
     params = {{ {parameter} = <value> }}\n\
     or in code:\n  \
     registry.register_value(SetupKey::base().path(\"{path}\"), json!({{\"{parameter}\": <value>}}))"
)]
pub struct MissingParameterError {
    pub parameter: String,
    pub path: String,
}

/// Placeholder names in left-to-right order.
///
/// A placeholder is `{` up to the next `}`; braces do not nest.
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    names
}

/// Expand `{name}` placeholders from `data` and append `_query_string`.
///
/// `null`, `false` and `""` count as missing.
///
/// # Errors
///
/// Returns the first placeholder without a usable value.
pub fn build_path(
    template: &str,
    data: &SubstitutionData,
) -> Result<String, MissingParameterError> {
    let mut path = template.to_string();
    for name in placeholders(template) {
        match data.get(name).filter(|v| is_present(v)) {
            Some(value) => {
                path = path.replace(&format!("{{{name}}}"), &value_to_param_string(value));
            }
            None => {
                return Err(MissingParameterError {
                    parameter: name.to_string(),
                    path: template.to_string(),
                });
            }
        }
    }
    if let Some(query) = data.query_string() {
        path.push('?');
        path.push_str(&query);
    }
    Ok(path)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
