//! Schema fragments: the parsed form of the JSON Schema subset Swagger 2.0 uses
//!
//! Fragments are parsed once, when the document is parsed, so a malformed
//! schema is a document error and never a per-response failure.
//! Supported keywords: `type`, `required`, `properties`, `additionalProperties`,
//! `items`, `enum`, `$ref`, `allOf`, `x-nullable`. Other keywords (formats,
//! descriptions, examples, numeric bounds) are ignored.

use serde_json::{Map, Value};

/// Prefix of every `$ref` a fragment may carry.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// A parsed schema fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFragment {
    pub shape: Shape,
    /// Allowed values (`enum`), checked in addition to the shape
    pub enum_values: Option<Vec<Value>>,
    /// `x-nullable: true` accepts JSON `null`
    pub nullable: bool,
}

/// Structural part of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// No type constraint (`{}`, `type: file`)
    Any,
    /// Reference to a named definition (name only, prefix stripped)
    Ref(String),
    /// Every member must match
    AllOf(Vec<SchemaFragment>),
    Object(ObjectShape),
    /// Array with item schema (`Any` when `items` is absent)
    Array(Box<SchemaFragment>),
    Scalar(ScalarType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    /// Declared properties in document order
    pub properties: Vec<(String, SchemaFragment)>,
    pub required: Vec<String>,
    pub additional: Additional,
}

impl ObjectShape {
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&SchemaFragment> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }
}

/// `additionalProperties` handling.
#[derive(Debug, Clone, PartialEq)]
pub enum Additional {
    Allowed,
    Forbidden,
    Schema(Box<SchemaFragment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl ScalarType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// Integral floats (`1.0`) count as integers.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

/// A fragment that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{pointer}: {reason}")]
pub struct FragmentError {
    /// JSON pointer inside the fragment ("" for its root)
    pub pointer: String,
    pub reason: String,
}

impl SchemaFragment {
    /// Fragment with a shape and no enum/nullable modifiers.
    #[must_use]
    pub const fn plain(shape: Shape) -> Self {
        Self {
            shape,
            enum_values: None,
            nullable: false,
        }
    }

    /// Parse a raw schema object.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending location when a keyword has the
    /// wrong JSON type, `type` is unknown, or `$ref` is not a local definition.
    pub fn parse(raw: &Value) -> Result<Self, FragmentError> {
        parse_at(raw, "")
    }

    /// Names of all definitions this fragment references, in traversal order.
    #[must_use]
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.shape {
            Shape::Ref(name) => out.push(name),
            Shape::AllOf(members) => members.iter().for_each(|m| m.collect_references(out)),
            Shape::Object(obj) => {
                for (_, prop) in &obj.properties {
                    prop.collect_references(out);
                }
                if let Additional::Schema(extra) = &obj.additional {
                    extra.collect_references(out);
                }
            }
            Shape::Array(items) => items.collect_references(out),
            Shape::Any | Shape::Scalar(_) => {}
        }
    }

    /// Normalized JSON form: only supported keywords, `required` sorted.
    ///
    /// Two fragments describe the same structure iff their normalized forms
    /// are equal (object key order is not significant for `Value` equality).
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = match &self.shape {
            Shape::Any => Map::new(),
            Shape::Ref(name) => single(
                "$ref",
                Value::String(format!("{DEFINITIONS_PREFIX}{}", escape_pointer(name))),
            ),
            Shape::AllOf(members) => single(
                "allOf",
                Value::Array(members.iter().map(Self::to_value).collect()),
            ),
            Shape::Object(obj) => object_to_map(obj),
            Shape::Array(items) => {
                let mut m = single("type", Value::String("array".into()));
                m.insert("items".into(), items.to_value());
                m
            }
            Shape::Scalar(t) => single("type", Value::String(t.as_str().into())),
        };
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        if self.nullable {
            out.insert("x-nullable".into(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    m
}

fn object_to_map(obj: &ObjectShape) -> Map<String, Value> {
    let mut m = single("type", Value::String("object".into()));
    if !obj.properties.is_empty() {
        let props = obj
            .properties
            .iter()
            .map(|(name, f)| (name.clone(), f.to_value()))
            .collect();
        m.insert("properties".into(), Value::Object(props));
    }
    if !obj.required.is_empty() {
        let mut required = obj.required.clone();
        required.sort();
        required.dedup();
        m.insert(
            "required".into(),
            Value::Array(required.into_iter().map(Value::String).collect()),
        );
    }
    match &obj.additional {
        Additional::Allowed => {}
        Additional::Forbidden => {
            m.insert("additionalProperties".into(), Value::Bool(false));
        }
        Additional::Schema(extra) => {
            m.insert("additionalProperties".into(), extra.to_value());
        }
    }
    m
}

fn parse_at(raw: &Value, pointer: &str) -> Result<SchemaFragment, FragmentError> {
    let Value::Object(obj) = raw else {
        return Err(error(
            pointer,
            format!("expected a schema object, found {}", json_type_name(raw)),
        ));
    };

    let nullable = match obj.get("x-nullable") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(error(pointer, "x-nullable must be a boolean")),
    };
    let enum_values = match obj.get("enum") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => return Err(error(pointer, "enum must be an array")),
    };

    let shape = if let Some(reference) = obj.get("$ref") {
        let reference = reference
            .as_str()
            .ok_or_else(|| error(pointer, "$ref must be a string"))?;
        let name = reference.strip_prefix(DEFINITIONS_PREFIX).ok_or_else(|| {
            error(
                pointer,
                format!("unsupported $ref '{reference}' (only {DEFINITIONS_PREFIX}* is resolved)"),
            )
        })?;
        Shape::Ref(unescape_pointer(name))
    } else if let Some(all_of) = obj.get("allOf") {
        let Value::Array(members) = all_of else {
            return Err(error(pointer, "allOf must be an array"));
        };
        let mut parsed = members
            .iter()
            .enumerate()
            .map(|(i, m)| parse_at(m, &format!("{pointer}/allOf/{i}")))
            .collect::<Result<Vec<_>, _>>()?;
        // Sibling object keywords act as one more member
        if has_object_keywords(obj) {
            parsed.push(SchemaFragment::plain(Shape::Object(parse_object(
                obj, pointer,
            )?)));
        }
        Shape::AllOf(parsed)
    } else {
        match obj.get("type") {
            None if has_object_keywords(obj) => Shape::Object(parse_object(obj, pointer)?),
            None if obj.contains_key("items") => {
                Shape::Array(Box::new(parse_items(obj, pointer)?))
            }
            None => Shape::Any,
            Some(Value::String(t)) => match t.as_str() {
                "object" => Shape::Object(parse_object(obj, pointer)?),
                "array" => Shape::Array(Box::new(parse_items(obj, pointer)?)),
                "string" => Shape::Scalar(ScalarType::String),
                "integer" => Shape::Scalar(ScalarType::Integer),
                "number" => Shape::Scalar(ScalarType::Number),
                "boolean" => Shape::Scalar(ScalarType::Boolean),
                "null" => Shape::Scalar(ScalarType::Null),
                "file" => Shape::Any,
                other => return Err(error(pointer, format!("unknown type '{other}'"))),
            },
            Some(other) => {
                return Err(error(
                    pointer,
                    format!("type must be a string, found {}", json_type_name(other)),
                ));
            }
        }
    };

    Ok(SchemaFragment {
        shape,
        enum_values,
        nullable,
    })
}

fn has_object_keywords(obj: &Map<String, Value>) -> bool {
    obj.contains_key("properties")
        || obj.contains_key("required")
        || obj.contains_key("additionalProperties")
}

fn parse_object(obj: &Map<String, Value>, pointer: &str) -> Result<ObjectShape, FragmentError> {
    let properties = match obj.get("properties") {
        None => Vec::new(),
        Some(Value::Object(props)) => props
            .iter()
            .map(|(name, schema)| {
                let at = format!("{pointer}/properties/{}", escape_pointer(name));
                Ok((name.clone(), parse_at(schema, &at)?))
            })
            .collect::<Result<Vec<_>, FragmentError>>()?,
        Some(_) => return Err(error(pointer, "properties must be an object")),
    };

    let required = match obj.get("required") {
        None => Vec::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| error(pointer, "required must list property names"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(error(pointer, "required must be an array")),
    };

    let additional = match obj.get("additionalProperties") {
        None | Some(Value::Bool(true)) => Additional::Allowed,
        Some(Value::Bool(false)) => Additional::Forbidden,
        Some(schema @ Value::Object(_)) => Additional::Schema(Box::new(parse_at(
            schema,
            &format!("{pointer}/additionalProperties"),
        )?)),
        Some(_) => {
            return Err(error(
                pointer,
                "additionalProperties must be a boolean or a schema",
            ));
        }
    };

    Ok(ObjectShape {
        properties,
        required,
        additional,
    })
}

fn parse_items(obj: &Map<String, Value>, pointer: &str) -> Result<SchemaFragment, FragmentError> {
    match obj.get("items") {
        None => Ok(SchemaFragment::plain(Shape::Any)),
        Some(items @ Value::Object(_)) => parse_at(items, &format!("{pointer}/items")),
        Some(_) => Err(error(pointer, "items must be a single schema object")),
    }
}

fn error(pointer: &str, reason: impl Into<String>) -> FragmentError {
    FragmentError {
        pointer: pointer.to_string(),
        reason: reason.into(),
    }
}

/// JSON type name used in messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// RFC 6901 token escaping.
#[must_use]
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> SchemaFragment {
        SchemaFragment::parse(&raw).unwrap()
    }

    #[test]
    fn empty_schema_is_any() {
        assert_eq!(parse(json!({})).shape, Shape::Any);
    }

    #[test]
    fn ref_strips_definitions_prefix() {
        let f = parse(json!({"$ref": "#/definitions/Pet"}));
        assert_eq!(f.shape, Shape::Ref("Pet".into()));
        assert_eq!(f.references(), vec!["Pet"]);
    }

    #[test]
    fn ref_unescapes_pointer_tokens() {
        let f = parse(json!({"$ref": "#/definitions/a~1b~0c"}));
        assert_eq!(f.shape, Shape::Ref("a/b~c".into()));
        assert_eq!(
            f.to_value(),
            json!({"$ref": "#/definitions/a~1b~0c"}),
            "normalization must re-escape"
        );
    }

    #[test]
    fn external_ref_rejected() {
        let err = SchemaFragment::parse(&json!({"$ref": "other.json#/Pet"})).unwrap_err();
        assert!(err.reason.contains("unsupported $ref"));
    }

    #[test]
    fn object_without_type_keyword() {
        let f = parse(json!({"required": ["id"], "properties": {"id": {"type": "integer"}}}));
        let Shape::Object(obj) = f.shape else {
            panic!("expected object shape");
        };
        assert_eq!(obj.required, vec!["id"]);
        assert_eq!(
            obj.property("id").map(|p| &p.shape),
            Some(&Shape::Scalar(ScalarType::Integer))
        );
    }

    #[test]
    fn all_of_with_sibling_properties_adds_member() {
        let f = parse(json!({
            "allOf": [{"$ref": "#/definitions/Base"}],
            "properties": {"extra": {"type": "string"}}
        }));
        let Shape::AllOf(members) = &f.shape else {
            panic!("expected allOf");
        };
        assert_eq!(members.len(), 2);
        assert!(matches!(members[1].shape, Shape::Object(_)));
    }

    #[test]
    fn array_without_items_accepts_anything() {
        let f = parse(json!({"type": "array"}));
        assert_eq!(
            f.shape,
            Shape::Array(Box::new(SchemaFragment::plain(Shape::Any)))
        );
    }

    #[test]
    fn nested_error_reports_pointer() {
        let err = SchemaFragment::parse(&json!({
            "type": "object",
            "properties": {"tags": {"type": "array", "items": {"type": "strng"}}}
        }))
        .unwrap_err();
        assert_eq!(err.pointer, "/properties/tags/items");
        assert_eq!(err.reason, "unknown type 'strng'");
    }

    #[test]
    fn wrong_keyword_types_rejected() {
        assert!(SchemaFragment::parse(&json!({"enum": "a"})).is_err());
        assert!(SchemaFragment::parse(&json!({"required": "id"})).is_err());
        assert!(SchemaFragment::parse(&json!({"type": ["string", "null"]})).is_err());
        assert!(SchemaFragment::parse(&json!("string")).is_err());
    }

    #[test]
    fn normalization_drops_docs_and_sorts_required() {
        let a = parse(json!({
            "type": "object",
            "description": "a pet",
            "required": ["name", "id"],
            "properties": {
                "id": {"type": "integer", "format": "int64"},
                "name": {"type": "string", "example": "rex"}
            }
        }));
        let b = parse(json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "name": {"type": "string"},
                "id": {"type": "integer"}
            }
        }));
        assert_eq!(a.to_value(), b.to_value());
    }

    #[test]
    fn integer_accepts_integral_float() {
        assert!(ScalarType::Integer.matches(&json!(3)));
        assert!(ScalarType::Integer.matches(&json!(3.0)));
        assert!(!ScalarType::Integer.matches(&json!(3.5)));
        assert!(!ScalarType::Integer.matches(&json!("3")));
    }
}
