//! Per-endpoint verdicts and the failures they can carry

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;
use crate::document::ResponseCase;
use crate::path::MissingParameterError;
use crate::validate::SchemaViolation;

/// Declared (path, method, response code) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EndpointCase {
    /// Path template as declared, without base path
    pub path: String,
    /// Lower-case method
    pub method: String,
    pub response_code: String,
}

impl EndpointCase {
    /// `"GET /pets/{id} 200"`
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {} {}",
            self.method.to_ascii_uppercase(),
            self.path,
            self.response_code
        )
    }
}

impl From<&ResponseCase<'_>> for EndpointCase {
    fn from(case: &ResponseCase<'_>) -> Self {
        Self {
            path: case.path.to_string(),
            method: case.method.to_string(),
            response_code: case.code.to_string(),
        }
    }
}

/// Request handed to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    /// Upper-case HTTP method
    pub method: String,
    /// Base path + built path + query string
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Response returned by the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// The executor could not complete a request.
///
/// An HTTP error status is not an execution error; it is a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a verdict failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Failure {
    /// A path placeholder had no setup value; fix the test setup
    MissingParameter(MissingParameterError),
    /// The request could not be executed; fix the service or environment
    Execution {
        method: String,
        path: String,
        error: ExecutionError,
    },
    /// The service answered with a different status
    StatusMismatch { expected: String, actual: u16 },
    /// A body was contracted but the response is not JSON
    MalformedBody { reason: String },
    /// The body does not match its contracted schema
    SchemaViolation { violations: Vec<SchemaViolation> },
}

impl Failure {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Execution { .. } => Severity::Critical,
            Self::MissingParameter(_)
            | Self::StatusMismatch { .. }
            | Self::MalformedBody { .. }
            | Self::SchemaViolation { .. } => Severity::Error,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::Execution { .. } => "execution",
            Self::StatusMismatch { .. } => "status_mismatch",
            Self::MalformedBody { .. } => "malformed_body",
            Self::SchemaViolation { .. } => "schema_violation",
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter(e) => write!(
                f,
                "no substitution value for {{{}}} in {}",
                e.parameter, e.path
            ),
            Self::Execution {
                method,
                path,
                error,
            } => write!(f, "unable to {method} {path}: {error}"),
            Self::StatusMismatch { expected, actual } => {
                write!(f, "expected status {expected}, got {actual}")
            }
            Self::MalformedBody { reason } => write!(f, "response body is not JSON: {reason}"),
            Self::SchemaViolation { violations } => {
                let rendered: Vec<String> = violations.iter().map(ToString::to_string).collect();
                write!(f, "body does not match schema: {}", rendered.join("; "))
            }
        }
    }
}

/// Outcome of checking one declared response against the live service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    pub case: EndpointCase,
    /// Request sent; absent when the path could not be built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
    /// Response received; absent when execution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    /// `None` means the verdict passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Verdict {
    #[must_use]
    pub const fn pass(
        case: EndpointCase,
        request: RequestSnapshot,
        response: ResponseSnapshot,
    ) -> Self {
        Self {
            case,
            request: Some(request),
            response: Some(response),
            failure: None,
        }
    }

    #[must_use]
    pub const fn fail(
        case: EndpointCase,
        request: Option<RequestSnapshot>,
        response: Option<ResponseSnapshot>,
        failure: Failure,
    ) -> Self {
        Self {
            case,
            request,
            response,
            failure: Some(failure),
        }
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Concrete path requested, including base path and query string
    #[must_use]
    pub fn built_path(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.path.as_str())
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.response.as_ref().map(|r| r.body.as_str())
    }

    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.failure.as_ref().map(Failure::severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ViolationKind;
    use serde_json::json;

    fn case() -> EndpointCase {
        EndpointCase {
            path: "/pets/{id}".into(),
            method: "get".into(),
            response_code: "200".into(),
        }
    }

    fn request() -> RequestSnapshot {
        RequestSnapshot {
            method: "GET".into(),
            path: "/api/pets/1".into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[test]
    fn label_uppercases_method() {
        assert_eq!(case().label(), "GET /pets/{id} 200");
    }

    #[test]
    fn severities() {
        let exec = Failure::Execution {
            method: "GET".into(),
            path: "/x".into(),
            error: ExecutionError::Connection("refused".into()),
        };
        assert_eq!(exec.severity(), Severity::Critical);
        let status = Failure::StatusMismatch {
            expected: "200".into(),
            actual: 500,
        };
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn failure_messages() {
        let exec = Failure::Execution {
            method: "GET".into(),
            path: "/api/pets".into(),
            error: ExecutionError::Connection("refused".into()),
        };
        assert_eq!(
            exec.to_string(),
            "unable to GET /api/pets: connection failed: refused"
        );
        let schema = Failure::SchemaViolation {
            violations: vec![SchemaViolation {
                pointer: String::new(),
                kind: ViolationKind::MissingRequired {
                    property: "age".into(),
                },
            }],
        };
        assert_eq!(
            schema.to_string(),
            "body does not match schema: (root): missing required property 'age'"
        );
    }

    #[test]
    fn verdict_accessors() {
        let v = Verdict::pass(
            case(),
            request(),
            ResponseSnapshot {
                status_code: 200,
                body: "{}".into(),
                content_type: None,
            },
        );
        assert!(v.passed());
        assert_eq!(v.built_path(), Some("/api/pets/1"));
        assert_eq!(v.status(), Some(200));
        assert_eq!(v.body(), Some("{}"));
        assert_eq!(v.severity(), None);
    }

    #[test]
    fn failed_verdict_serializes_tagged_failure() {
        let v = Verdict::fail(
            case(),
            Some(request()),
            None,
            Failure::Execution {
                method: "GET".into(),
                path: "/api/pets/1".into(),
                error: ExecutionError::Timeout("10s".into()),
            },
        );
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(
            json["failure"],
            json!({
                "type": "execution",
                "method": "GET",
                "path": "/api/pets/1",
                "error": {"kind": "timeout", "message": "10s"}
            })
        );
        assert!(json.get("response").is_none());
        let back: Verdict = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
