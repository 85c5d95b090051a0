//! Cross-service consistency: compare local definitions with a master document
//!
//! Advisory only. Each discrepancy names the definition, the master's shape,
//! the local shape, and the individual differences between them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::SwaggerDocument;

/// A definition whose local shape differs from the master's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Discrepancy {
    pub definition: String,
    /// Normalized master shape
    pub expected: Value,
    /// Normalized local shape; `None` when the definition is missing locally
    pub actual: Option<Value>,
    /// Human-readable differences, e.g. `properties.id.type: expected integer, found string`
    pub differences: Vec<String>,
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.definition, self.differences.join("; "))
    }
}

/// Compare `local` against `master`.
///
/// Without a `service` prefix, every definition present in both documents is
/// compared. With one, only definitions whose name starts with the prefix are
/// compared, and a prefixed master definition missing locally is reported too.
#[must_use]
pub fn compare(
    local: &SwaggerDocument,
    master: &SwaggerDocument,
    service: Option<&str>,
) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    for (name, expected) in master.definitions() {
        if service.is_some_and(|prefix| !name.starts_with(prefix)) {
            continue;
        }
        let expected = expected.to_value();
        match local.lookup_definition(name) {
            None if service.is_some() => out.push(Discrepancy {
                definition: name.to_string(),
                expected,
                actual: None,
                differences: vec!["missing locally".to_string()],
            }),
            None => {}
            Some(actual) => {
                let actual = actual.to_value();
                let mut differences = Vec::new();
                diff(&expected, &actual, "", &mut differences);
                if !differences.is_empty() {
                    out.push(Discrepancy {
                        definition: name.to_string(),
                        expected,
                        actual: Some(actual),
                        differences,
                    });
                }
            }
        }
    }
    out
}

fn diff(expected: &Value, actual: &Value, at: &str, out: &mut Vec<String>) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, ev) in e {
                let child = join(at, key);
                match a.get(key) {
                    Some(av) => diff(ev, av, &child, out),
                    None => out.push(format!("{child}: missing locally")),
                }
            }
            for key in a.keys().filter(|k| !e.contains_key(*k)) {
                out.push(format!("{}: not in master", join(at, key)));
            }
        }
        (Value::Array(e), Value::Array(a)) if e.len() == a.len() => {
            for (i, (ev, av)) in e.iter().zip(a).enumerate() {
                diff(ev, av, &join(at, &i.to_string()), out);
            }
        }
        _ if expected == actual => {}
        _ => out.push(format!(
            "{}: expected {}, found {}",
            if at.is_empty() { "(root)" } else { at },
            display(expected),
            display(actual)
        )),
    }
}

fn join(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{at}.{key}")
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(definitions: Value) -> SwaggerDocument {
        SwaggerDocument::from_value(json!({"paths": {}, "definitions": definitions})).unwrap()
    }

    #[test]
    fn identical_structures_are_consistent() {
        let master = doc(json!({
            "Pet": {"type": "object", "required": ["id"], "properties": {"id": {"type": "integer"}}}
        }));
        let local = doc(json!({
            "Pet": {"type": "object", "description": "local copy", "required": ["id"],
                    "properties": {"id": {"type": "integer", "format": "int64"}}}
        }));
        assert!(compare(&local, &master, None).is_empty());
    }

    #[test]
    fn reports_type_and_property_differences() {
        let master = doc(json!({
            "Pet": {"type": "object", "properties": {
                "id": {"type": "integer"}, "age": {"type": "integer"}
            }}
        }));
        let local = doc(json!({
            "Pet": {"type": "object", "properties": {
                "id": {"type": "string"}, "nickname": {"type": "string"}
            }}
        }));
        let found = compare(&local, &master, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].definition, "Pet");
        assert_eq!(
            found[0].differences,
            vec![
                "properties.id.type: expected integer, found string",
                "properties.age: missing locally",
                "properties.nickname: not in master",
            ]
        );
        assert!(found[0].actual.is_some());
    }

    #[test]
    fn unshared_definitions_ignored_without_scope() {
        let master = doc(json!({"Owner": {"type": "object"}}));
        let local = doc(json!({"Pet": {"type": "object"}}));
        assert!(compare(&local, &master, None).is_empty());
    }

    #[test]
    fn service_scope_filters_and_reports_missing() {
        let master = doc(json!({
            "petsPet": {"type": "object"},
            "petsToy": {"type": "object"},
            "billingInvoice": {"type": "string"}
        }));
        let local = doc(json!({
            "petsPet": {"type": "object"},
            "billingInvoice": {"type": "integer"}
        }));
        let found = compare(&local, &master, Some("pets"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].definition, "petsToy");
        assert_eq!(found[0].actual, None);
        assert_eq!(found[0].to_string(), "petsToy: missing locally");
    }

    #[test]
    fn required_order_is_not_a_difference() {
        let master = doc(json!({"P": {"required": ["a", "b"]}}));
        let local = doc(json!({"P": {"required": ["b", "a"]}}));
        assert!(compare(&local, &master, None).is_empty());
    }

    #[test]
    fn required_difference_shows_both_lists() {
        let master = doc(json!({"P": {"required": ["a", "b"]}}));
        let local = doc(json!({"P": {"required": ["a"]}}));
        let found = compare(&local, &master, None);
        assert_eq!(
            found[0].differences,
            vec![r#"required: expected ["a","b"], found ["a"]"#]
        );
    }
}
