//! Project configuration for contract checks

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::setup::{DATA_KEY, HEADERS_KEY, QUERY_STRING_KEY, SetupKey, SetupRegistry};

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the service under test
    pub base_url: String,

    /// Where the service publishes its Swagger document
    #[serde(default = "default_swagger_path")]
    pub swagger_path: String,

    /// Base URL of the upstream master service (enables the consistency check)
    #[serde(default)]
    pub master_url: Option<String>,

    /// Where the master publishes its Swagger document
    #[serde(default = "default_swagger_path")]
    pub master_swagger_path: String,

    /// Definition-name prefix owned by this service (scopes the consistency check)
    #[serde(default)]
    pub service: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP headers sent with every request (auth, API keys)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Substitution data per endpoint
    #[serde(default)]
    pub setup: Vec<SetupRule>,
}

/// A declarative setup rule.
///
/// ```toml
/// [[setup]]
/// path = "/pets/{id}"
/// method = "get"
/// code = "404"
/// params = { id = 999999 }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupRule {
    /// Path template to match (omit for every path)
    #[serde(default)]
    pub path: Option<String>,
    /// Method to match (omit for every method)
    #[serde(default)]
    pub method: Option<String>,
    /// Response code to match (omit for every code)
    #[serde(default)]
    pub code: Option<String>,
    /// Path parameter values
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Literal query string appended to the path
    #[serde(default)]
    pub query_string: Option<String>,
    /// Request body
    #[serde(default)]
    pub data: Option<Value>,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SetupRule {
    #[must_use]
    pub fn key(&self) -> SetupKey {
        let mut key = SetupKey::base();
        if let Some(path) = &self.path {
            key = key.path(path.clone());
        }
        if let Some(method) = &self.method {
            key = key.method(method.clone());
        }
        if let Some(code) = &self.code {
            key = key.code(code.clone());
        }
        key
    }

    /// Substitution object this rule contributes.
    #[must_use]
    pub fn substitution(&self) -> Map<String, Value> {
        let mut values = self.params.clone();
        if let Some(query) = &self.query_string {
            values.insert(QUERY_STRING_KEY.into(), Value::String(query.clone()));
        }
        if let Some(data) = &self.data {
            values.insert(DATA_KEY.into(), data.clone());
        }
        if !self.headers.is_empty() {
            let headers = self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            values.insert(HEADERS_KEY.into(), Value::Object(headers));
        }
        values
    }
}

fn default_swagger_path() -> String {
    "/swagger.json".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            swagger_path: default_swagger_path(),
            master_url: None,
            master_swagger_path: default_swagger_path(),
            service: None,
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
            setup: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.apivet.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apivet.toml", ".apivet.json", "apivet.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Setup rules as a registry.
    ///
    /// Rules sharing a key are merged in file order, later values winning.
    #[must_use]
    pub fn setup_registry(&self) -> SetupRegistry {
        let mut merged: BTreeMap<SetupKey, Map<String, Value>> = BTreeMap::new();
        for rule in &self.setup {
            merged.entry(rule.key()).or_default().extend(rule.substitution());
        }
        let mut registry = SetupRegistry::new();
        for (key, values) in merged {
            registry.register_value(key, Value::Object(values));
        }
        registry
    }

    /// Example config file
    #[must_use]
    pub const fn example() -> &'static str {
        r#"# apivet configuration

# Service under test
base_url = "http://localhost:3000"
swagger_path = "/swagger.json"

# Per-request timeout in seconds
# timeout_secs = 10

# Upstream master service: shared models must match its definitions
# master_url = "http://master.internal:8080"
# master_swagger_path = "/swagger.json"
# service = "pets"

# HTTP headers sent with every request
[headers]
# Authorization = "Bearer your-token-here"

# Setup rules supply path parameters, query strings, bodies and headers.
# Omit path/method/code to match every value; the most specific rule wins.
[[setup]]
params = { id = 1 }

# [[setup]]
# path = "/pets/{id}"
# method = "get"
# code = "404"
# params = { id = 999999 }
#
# [[setup]]
# path = "/pets"
# method = "post"
# code = "201"
# data = { name = "rex" }
# headers = { "Content-Type" = "application/json" }
#
# [[setup]]
# path = "/pets"
# method = "get"
# query_string = "limit=5"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.swagger_path, "/swagger.json");
        assert_eq!(config.timeout_secs, 10);
        assert!(config.master_url.is_none());
    }

    #[test]
    fn example_parses() {
        let config: Config = toml::from_str(Config::example()).unwrap();
        assert_eq!(config.setup.len(), 1);
        let data = config.setup_registry().resolve("/pets/{id}", "get", "200");
        assert_eq!(data.get("id"), Some(&json!(1)));
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
base_url = "http://localhost:4000"
master_url = "http://master:8080"
service = "pets"

[headers]
Authorization = "Bearer token123"

[[setup]]
path = "/pets/{id}"
method = "GET"
code = "404"
params = { id = 999 }

[[setup]]
path = "/pets"
method = "post"
data = { name = "rex", tags = ["a"] }
query_string = "dry_run=true"
headers = { X-Trace = "1" }
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.base_url, "http://localhost:4000");
        assert_eq!(config.swagger_path, "/swagger.json");
        assert_eq!(config.master_url.as_deref(), Some("http://master:8080"));
        assert_eq!(config.service.as_deref(), Some("pets"));
        assert_eq!(
            config.headers.get("Authorization").map(String::as_str),
            Some("Bearer token123")
        );
        assert_eq!(config.setup.len(), 2);

        let registry = config.setup_registry();
        let not_found = registry.resolve("/pets/{id}", "get", "404");
        assert_eq!(not_found.get("id"), Some(&json!(999)));
        assert!(registry.resolve("/pets/{id}", "get", "200").get("id").is_none());

        let create = registry.resolve("/pets", "post", "201");
        assert_eq!(create.data(), Some(&json!({"name": "rex", "tags": ["a"]})));
        assert_eq!(create.query_string().as_deref(), Some("dry_run=true"));
        assert_eq!(create.headers().get("X-Trace").map(String::as_str), Some("1"));
    }

    #[test]
    fn rules_with_same_key_merge_in_order() {
        let toml = r#"
base_url = "http://localhost"

[[setup]]
params = { id = 1, owner = "ann" }

[[setup]]
params = { id = 2 }
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let registry = config.setup_registry();
        assert_eq!(registry.len(), 1);
        let data = registry.resolve("/x", "get", "200");
        assert_eq!(data.get("id"), Some(&json!(2)));
        assert_eq!(data.get("owner"), Some(&json!("ann")));
    }

    #[test]
    fn load_json_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("apivet.json");
        std::fs::write(
            &json_path,
            r#"{"base_url": "http://json:1", "setup": [{"code": "200", "params": {"id": 5}}]}"#,
        )
        .unwrap();
        let config = Config::load(&json_path).unwrap();
        assert_eq!(config.base_url, "http://json:1");
        assert_eq!(config.setup[0].code.as_deref(), Some("200"));

        let toml_path = dir.path().join("apivet.toml");
        std::fs::write(&toml_path, "base_url = \"http://toml:2\"\ntimeout_secs = 3\n").unwrap();
        let config = Config::load(&toml_path).unwrap();
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn load_reports_missing_file_and_bad_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io(..))));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "base_url = ").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse(_))));
    }
}
