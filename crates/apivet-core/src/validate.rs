//! Recursive-descent validation of JSON values against schema fragments
//!
//! Total over well-formed JSON: every mismatch becomes a [`SchemaViolation`],
//! nothing panics and nothing short-circuits, so a failing body reports all
//! of its problems at once.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::SwaggerDocument;
use crate::fragment::{
    Additional, ObjectShape, SchemaFragment, Shape, escape_pointer, json_type_name,
};

/// One structural mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaViolation {
    /// JSON pointer into the validated value ("" for the root)
    pub pointer: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequired { property: String },
    TypeMismatch { expected: String, found: String },
    NotInEnum { value: Value },
    UnexpectedProperty { property: String },
    UnresolvedRef { reference: String },
    RefCycle { reference: String },
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let at = if self.pointer.is_empty() {
            "(root)"
        } else {
            self.pointer.as_str()
        };
        match &self.kind {
            ViolationKind::MissingRequired { property } => {
                write!(f, "{at}: missing required property '{property}'")
            }
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{at}: expected {expected}, found {found}")
            }
            ViolationKind::NotInEnum { value } => {
                write!(f, "{at}: {value} is not one of the allowed values")
            }
            ViolationKind::UnexpectedProperty { property } => {
                write!(f, "{at}: property '{property}' is not allowed")
            }
            ViolationKind::UnresolvedRef { reference } => {
                write!(f, "{at}: $ref '{reference}' does not resolve")
            }
            ViolationKind::RefCycle { reference } => {
                write!(f, "{at}: $ref '{reference}' never reaches a concrete schema")
            }
        }
    }
}

/// Check `value` against `fragment`, resolving `$ref`s in `document`.
///
/// An absent fragment (e.g. a 204 response) accepts any value.
///
/// # Errors
///
/// Returns every violation found, in traversal order.
pub fn validate(
    value: &Value,
    fragment: Option<&SchemaFragment>,
    document: &SwaggerDocument,
) -> Result<(), Vec<SchemaViolation>> {
    let Some(fragment) = fragment else {
        return Ok(());
    };
    let mut walker = Walker {
        document,
        violations: Vec::new(),
    };
    walker.check(value, fragment, "", &mut Vec::new());
    if walker.violations.is_empty() {
        Ok(())
    } else {
        Err(walker.violations)
    }
}

struct Walker<'d> {
    document: &'d SwaggerDocument,
    violations: Vec<SchemaViolation>,
}

impl Walker<'_> {
    fn push(&mut self, pointer: &str, kind: ViolationKind) {
        self.violations.push(SchemaViolation {
            pointer: pointer.to_string(),
            kind,
        });
    }

    /// `entered` holds the definitions followed since the last descent into
    /// `value`; re-entering one of them is a cycle such as
    /// `A: {$ref: B}, B: {allOf: [{$ref: A}]}`.
    fn check(
        &mut self,
        value: &Value,
        fragment: &SchemaFragment,
        pointer: &str,
        entered: &mut Vec<String>,
    ) {
        if value.is_null() && fragment.nullable {
            return;
        }
        if let Some(allowed) = &fragment.enum_values {
            if !allowed.contains(value) {
                self.push(
                    pointer,
                    ViolationKind::NotInEnum {
                        value: value.clone(),
                    },
                );
            }
        }

        match &fragment.shape {
            Shape::Any => {}
            Shape::Ref(name) => {
                let reference = format!("#/definitions/{}", escape_pointer(name));
                if entered.contains(name) {
                    self.push_once(pointer, ViolationKind::RefCycle { reference });
                    return;
                }
                match self.document.lookup_definition(name) {
                    Some(target) => {
                        entered.push(name.clone());
                        self.check(value, target, pointer, entered);
                        entered.pop();
                    }
                    None => self.push(pointer, ViolationKind::UnresolvedRef { reference }),
                }
            }
            Shape::AllOf(members) => {
                for member in members {
                    self.check(value, member, pointer, entered);
                }
            }
            Shape::Scalar(t) => {
                if !t.matches(value) {
                    self.type_mismatch(pointer, t.as_str(), value);
                }
            }
            Shape::Array(items) => match value {
                Value::Array(elements) => {
                    for (i, element) in elements.iter().enumerate() {
                        self.check(element, items, &format!("{pointer}/{i}"), &mut Vec::new());
                    }
                }
                other => self.type_mismatch(pointer, "array", other),
            },
            Shape::Object(shape) => self.check_object(value, shape, pointer),
        }
    }

    fn check_object(&mut self, value: &Value, shape: &ObjectShape, pointer: &str) {
        let Value::Object(map) = value else {
            self.type_mismatch(pointer, "object", value);
            return;
        };
        for name in &shape.required {
            if !map.contains_key(name) {
                self.push(
                    pointer,
                    ViolationKind::MissingRequired {
                        property: name.clone(),
                    },
                );
            }
        }
        for (name, child) in map {
            let child_pointer = format!("{pointer}/{}", escape_pointer(name));
            if let Some(declared) = shape.property(name) {
                self.check(child, declared, &child_pointer, &mut Vec::new());
                continue;
            }
            match &shape.additional {
                Additional::Allowed => {}
                Additional::Forbidden => self.push(
                    pointer,
                    ViolationKind::UnexpectedProperty {
                        property: name.clone(),
                    },
                ),
                Additional::Schema(extra) => {
                    self.check(child, extra, &child_pointer, &mut Vec::new());
                }
            }
        }
    }

    fn push_once(&mut self, pointer: &str, kind: ViolationKind) {
        let seen = self
            .violations
            .iter()
            .any(|v| v.pointer == pointer && v.kind == kind);
        if !seen {
            self.push(pointer, kind);
        }
    }

    fn type_mismatch(&mut self, pointer: &str, expected: &str, found: &Value) {
        self.push(
            pointer,
            ViolationKind::TypeMismatch {
                expected: expected.to_string(),
                found: json_type_name(found).to_string(),
            },
        );
    }
}
