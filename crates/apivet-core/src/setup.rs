//! Per-endpoint setup rules and substitution data
//!
//! Rules are keyed by any combination of path template, method and response
//! code. Resolving a concrete endpoint runs every matching rule from least to
//! most specific and shallow-merges the returned objects, so the most specific
//! rule wins on conflicting keys:
//!
//! ```text
//! base, code, method, path, method+code, path+code, path+method, path+method+code
//! ```

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Reserved key: literal query string appended to the built path.
pub const QUERY_STRING_KEY: &str = "_query_string";
/// Reserved key: request body.
pub const DATA_KEY: &str = "_data";
/// Reserved key: request headers (object of name → value).
pub const HEADERS_KEY: &str = "_headers";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("setup key has more than one {kind}: '{first}' and '{second}'")]
    DuplicatePart {
        kind: &'static str,
        first: String,
        second: String,
    },
}

/// Which endpoints a rule applies to. `None` parts are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetupKey {
    path: Option<String>,
    method: Option<String>,
    code: Option<String>,
}

impl SetupKey {
    /// The base rule, applied to every endpoint.
    #[must_use]
    pub fn base() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Methods are matched case-insensitively.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build a key from loose parts, in any order.
    ///
    /// A part starting with `/` is a path, three digits or `default` is a
    /// response code, anything else is a method. Empty parts are skipped, so
    /// `[""]` is the base key.
    ///
    /// # Errors
    ///
    /// Returns error if two parts classify as the same kind.
    pub fn from_parts(parts: &[&str]) -> Result<Self, SetupError> {
        let mut key = Self::default();
        for part in parts.iter().filter(|p| !p.is_empty()) {
            let (kind, slot, value) = if part.starts_with('/') {
                ("path", &mut key.path, (*part).to_string())
            } else if is_response_code(part) {
                ("response code", &mut key.code, (*part).to_string())
            } else {
                ("method", &mut key.method, part.to_ascii_lowercase())
            };
            if let Some(first) = slot.take() {
                return Err(SetupError::DuplicatePart {
                    kind,
                    first,
                    second: value,
                });
            }
            *slot = Some(value);
        }
        Ok(key)
    }

    /// The eight keys consulted for one endpoint, least specific first.
    fn lookup_chain(path: &str, method: &str, code: &str) -> [Self; 8] {
        let p = || Some(path.to_string());
        let m = || Some(method.to_ascii_lowercase());
        let c = || Some(code.to_string());
        let key = |path, method, code| Self { path, method, code };
        [
            key(None, None, None),
            key(None, None, c()),
            key(None, m(), None),
            key(p(), None, None),
            key(None, m(), c()),
            key(p(), None, c()),
            key(p(), m(), None),
            key(p(), m(), c()),
        ]
    }
}

impl std::fmt::Display for SetupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = [&self.path, &self.method, &self.code]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            f.write_str("(base)")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

fn is_response_code(part: &str) -> bool {
    part == "default" || (part.len() == 3 && part.bytes().all(|b| b.is_ascii_digit()))
}

/// The endpoint a rule is being evaluated for.
#[derive(Debug, Clone, Copy)]
pub struct SetupContext<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub code: &'a str,
}

type Computation = Box<dyn Fn(&SetupContext<'_>) -> Value + Send + Sync>;

/// Registry of setup rules, populated before a run and read-only during it.
#[derive(Default)]
pub struct SetupRegistry {
    rules: HashMap<SetupKey, Computation>,
}

impl std::fmt::Debug for SetupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&SetupKey> = self.rules.keys().collect();
        keys.sort();
        f.debug_struct("SetupRegistry").field("rules", &keys).finish()
    }
}

impl SetupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a computation. A later registration for the same key replaces
    /// the earlier one. A computation returning anything but a JSON object
    /// contributes nothing.
    pub fn register<F>(&mut self, key: SetupKey, computation: F)
    where
        F: Fn(&SetupContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.rules.insert(key, Box::new(computation));
    }

    /// Register a fixed substitution object.
    pub fn register_value(&mut self, key: SetupKey, value: Value) {
        self.register(key, move |_| value.clone());
    }

    /// Register under a key built by [`SetupKey::from_parts`].
    ///
    /// # Errors
    ///
    /// Returns error if the parts are ambiguous.
    pub fn register_parts<F>(&mut self, parts: &[&str], computation: F) -> Result<(), SetupError>
    where
        F: Fn(&SetupContext<'_>) -> Value + Send + Sync + 'static,
    {
        let key = SetupKey::from_parts(parts)?;
        self.register(key, computation);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merged substitution data for one concrete endpoint.
    #[must_use]
    pub fn resolve(&self, path: &str, method: &str, code: &str) -> SubstitutionData {
        let ctx = SetupContext { path, method, code };
        let mut data = SubstitutionData::default();
        for key in SetupKey::lookup_chain(path, method, code) {
            if let Some(computation) = self.rules.get(&key) {
                if let Value::Object(values) = computation(&ctx) {
                    data.merge(values);
                }
            }
        }
        data
    }
}

/// Substitution values for one endpoint: path parameters plus the reserved
/// `_query_string`, `_data` and `_headers` keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionData {
    values: Map<String, Value>,
}

impl From<Map<String, Value>> for SubstitutionData {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl SubstitutionData {
    /// Shallow merge; incoming keys overwrite existing ones.
    pub fn merge(&mut self, values: Map<String, Value>) {
        for (k, v) in values {
            self.values.insert(k, v);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Query string without a leading `?`, if present and non-empty.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        let raw = match self.values.get(QUERY_STRING_KEY)? {
            Value::Null | Value::Bool(false) => return None,
            other => value_to_param_string(other),
        };
        let trimmed = raw.strip_prefix('?').unwrap_or(&raw);
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Request body, if one was supplied.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.values.get(DATA_KEY).filter(|v| !v.is_null())
    }

    /// Request headers; non-string values are rendered as JSON.
    #[must_use]
    pub fn headers(&self) -> BTreeMap<String, String> {
        match self.values.get(HEADERS_KEY) {
            Some(Value::Object(headers)) => headers
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), value_to_param_string(v)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

/// String form of a substitution value: strings verbatim, everything else as JSON.
#[must_use]
pub fn value_to_param_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
