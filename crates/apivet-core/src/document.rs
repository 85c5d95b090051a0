//! Swagger 2.0 document model
//!
//! Parsed once, immutable afterwards. Enumerates every declared
//! (path, method, response code) triple in document order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::fragment::{FragmentError, SchemaFragment, escape_pointer};

/// Path item keys that declare operations.
const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];

/// Prefix of `$ref`s between response objects.
const RESPONSES_PREFIX: &str = "#/responses/";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Invalid JSON: {0}")]
    Json(String),
    #[error("Invalid YAML: {0}")]
    Yaml(String),
    #[error("document root must be an object")]
    NotAnObject,
    #[error("document has no `paths` object")]
    MissingPaths,
    #[error("{location}: {reason}")]
    Malformed { location: String, reason: String },
    #[error("{location}: malformed schema at '{}': {}", .source.pointer, .source.reason)]
    MalformedSchema {
        location: String,
        source: FragmentError,
    },
    #[error("{location}: $ref '{reference}' does not resolve to a definition")]
    UnresolvedRef { location: String, reference: String },
}

/// A declared response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code string as declared (`"200"`, `"default"`)
    pub code: String,
    /// Body contract; `None` for responses without a schema (e.g. 204)
    pub fragment: Option<SchemaFragment>,
}

/// One operation of a path item.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Lower-case HTTP method
    pub method: String,
    pub responses: Vec<Response>,
}

impl Operation {
    /// Whether `status` is explicitly declared by this operation.
    #[must_use]
    pub fn declares(&self, status: u16) -> bool {
        let code = status.to_string();
        self.responses.iter().any(|r| r.code == code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    /// Path template, e.g. `/pets/{id}`
    pub template: String,
    pub operations: Vec<Operation>,
}

/// One enumerated (path, method, response code) triple.
#[derive(Debug, Clone, Copy)]
pub struct ResponseCase<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub code: &'a str,
    pub fragment: Option<&'a SchemaFragment>,
    pub operation: &'a Operation,
}

impl ResponseCase<'_> {
    /// Whether an actual status satisfies the declared code.
    ///
    /// `default` matches any status the operation does not declare explicitly.
    #[must_use]
    pub fn expects(&self, status: u16) -> bool {
        if self.code == "default" {
            !self.operation.declares(status)
        } else {
            self.code == status.to_string()
        }
    }
}

/// Parsed Swagger document.
#[derive(Debug, Clone)]
pub struct SwaggerDocument {
    base_path: String,
    definitions: BTreeMap<String, SchemaFragment>,
    paths: Vec<PathItem>,
    raw: Value,
}

impl SwaggerDocument {
    /// Parse a raw JSON document.
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON, a missing `paths` object, a malformed
    /// schema fragment, or a `$ref` that does not resolve within `definitions`.
    pub fn parse(raw_json: &str) -> Result<Self, DocumentError> {
        let raw: Value =
            serde_json::from_str(raw_json).map_err(|e| DocumentError::Json(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Same as [`SwaggerDocument::parse`], with YAML syntax errors instead of JSON ones.
    pub fn parse_yaml(raw_yaml: &str) -> Result<Self, DocumentError> {
        let raw: Value =
            serde_yml::from_str(raw_yaml).map_err(|e| DocumentError::Yaml(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Load a document from disk.
    ///
    /// Detection strategy: extension first (`.yaml`/`.yml`/`.json`), then
    /// content sniffing (leading `{` → JSON, otherwise YAML).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DocumentError::Io(path.to_path_buf(), e.to_string()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content),
            "json" => Self::parse(&content),
            _ => Self::parse_sniffed(&content),
        }
    }

    /// Parse a document of unknown format: leading `{` → JSON, otherwise YAML.
    ///
    /// # Errors
    ///
    /// See [`SwaggerDocument::parse`].
    pub fn parse_sniffed(content: &str) -> Result<Self, DocumentError> {
        if content.trim_start().starts_with('{') {
            Self::parse(content)
        } else {
            Self::parse_yaml(content)
        }
    }

    /// Build the model from an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// See [`SwaggerDocument::parse`].
    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let root = raw.as_object().ok_or(DocumentError::NotAnObject)?;

        let base_path = match root.get("basePath") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim_end_matches('/').to_string(),
            Some(_) => return Err(malformed("#/basePath", "must be a string")),
        };

        let mut definitions = BTreeMap::new();
        match root.get("definitions") {
            None | Some(Value::Null) => {}
            Some(Value::Object(defs)) => {
                for (name, schema) in defs {
                    let location = format!("#/definitions/{}", escape_pointer(name));
                    definitions.insert(name.clone(), parse_fragment(schema, location)?);
                }
            }
            Some(_) => return Err(malformed("#/definitions", "must be an object")),
        }

        let shared_responses = match root.get("responses") {
            Some(Value::Object(r)) => Some(r),
            _ => None,
        };

        let Some(Value::Object(raw_paths)) = root.get("paths") else {
            return Err(DocumentError::MissingPaths);
        };
        let mut paths = Vec::with_capacity(raw_paths.len());
        for (template, item) in raw_paths {
            if template.starts_with("x-") {
                continue;
            }
            let location = format!("#/paths/{}", escape_pointer(template));
            let item = item
                .as_object()
                .ok_or_else(|| malformed(&location, "path item must be an object"))?;
            let mut operations = Vec::new();
            for (key, op) in item {
                let method = key.to_ascii_lowercase();
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                let op_location = format!("{location}/{key}");
                operations.push(parse_operation(
                    method,
                    op,
                    &op_location,
                    shared_responses,
                )?);
            }
            paths.push(PathItem {
                template: template.clone(),
                operations,
            });
        }

        let doc = Self {
            base_path,
            definitions,
            paths,
            raw,
        };
        doc.check_references()?;
        Ok(doc)
    }

    /// Every `$ref` inside any fragment must name an existing definition.
    fn check_references(&self) -> Result<(), DocumentError> {
        let definition_fragments = self
            .definitions
            .iter()
            .map(|(name, f)| (format!("#/definitions/{}", escape_pointer(name)), f));
        let response_fragments = self.produce_responses().filter_map(|case| {
            case.fragment.map(|f| {
                (
                    format!(
                        "#/paths/{}/{}/responses/{}/schema",
                        escape_pointer(case.path),
                        case.method,
                        case.code
                    ),
                    f,
                )
            })
        });
        for (location, fragment) in definition_fragments.chain(response_fragments) {
            if let Some(missing) = fragment
                .references()
                .into_iter()
                .find(|name| !self.definitions.contains_key(*name))
            {
                return Err(DocumentError::UnresolvedRef {
                    location,
                    reference: format!("#/definitions/{}", escape_pointer(missing)),
                });
            }
        }
        Ok(())
    }

    /// Prefix applied to every path template (no trailing slash).
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn lookup_definition(&self, name: &str) -> Option<&SchemaFragment> {
        self.definitions.get(name)
    }

    /// All definitions, ordered by name.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &SchemaFragment)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The decoded document as received.
    #[must_use]
    pub const fn raw(&self) -> &Value {
        &self.raw
    }

    /// Every declared response: paths in document order, then methods, then codes.
    ///
    /// Borrowed from the immutable model, so it can be called any number of times.
    pub fn produce_responses(&self) -> impl Iterator<Item = ResponseCase<'_>> + '_ {
        self.paths.iter().flat_map(|item| {
            item.operations.iter().flat_map(move |op| {
                op.responses.iter().map(move |r| ResponseCase {
                    path: &item.template,
                    method: &op.method,
                    code: &r.code,
                    fragment: r.fragment.as_ref(),
                    operation: op,
                })
            })
        })
    }
}

fn parse_operation(
    method: String,
    op: &Value,
    location: &str,
    shared_responses: Option<&Map<String, Value>>,
) -> Result<Operation, DocumentError> {
    let op = op
        .as_object()
        .ok_or_else(|| malformed(location, "operation must be an object"))?;
    let mut responses = Vec::new();
    match op.get("responses") {
        None => {}
        Some(Value::Object(declared)) => {
            for (code, response) in declared {
                if code.starts_with("x-") {
                    continue;
                }
                let resp_location = format!("{location}/responses/{code}");
                let response = resolve_response(response, &resp_location, shared_responses)?;
                let fragment = match response.get("schema") {
                    None | Some(Value::Null) => None,
                    Some(schema) => {
                        Some(parse_fragment(schema, format!("{resp_location}/schema"))?)
                    }
                };
                responses.push(Response {
                    code: code.clone(),
                    fragment,
                });
            }
        }
        Some(_) => return Err(malformed(location, "responses must be an object")),
    }
    Ok(Operation { method, responses })
}

/// Follow a `#/responses/Name` reference if present.
fn resolve_response<'a>(
    response: &'a Value,
    location: &str,
    shared: Option<&'a Map<String, Value>>,
) -> Result<&'a Map<String, Value>, DocumentError> {
    let obj = response
        .as_object()
        .ok_or_else(|| malformed(location, "response must be an object"))?;
    let Some(reference) = obj.get("$ref") else {
        return Ok(obj);
    };
    let target = reference
        .as_str()
        .and_then(|r| r.strip_prefix(RESPONSES_PREFIX))
        .and_then(|name| shared.and_then(|s| s.get(name)))
        .and_then(Value::as_object);
    target.ok_or_else(|| DocumentError::UnresolvedRef {
        location: location.to_string(),
        reference: reference.as_str().unwrap_or_default().to_string(),
    })
}

fn parse_fragment(schema: &Value, location: String) -> Result<SchemaFragment, DocumentError> {
    SchemaFragment::parse(schema)
        .map_err(|source| DocumentError::MalformedSchema { location, source })
}

fn malformed(location: &str, reason: &str) -> DocumentError {
    DocumentError::Malformed {
        location: location.to_string(),
        reason: reason.to_string(),
    }
}
