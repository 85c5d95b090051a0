//! reqwest-backed executor and document fetching

use std::collections::BTreeMap;
use std::time::Duration;

use apivet_core::Config;
use apivet_core::document::{DocumentError, SwaggerDocument};
use apivet_core::verdict::{ExecutionError, RequestSnapshot, ResponseSnapshot};

use crate::conformance::Executor;

/// Sends requests to a live service with a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::blocking::Client,
    base_url: String,
    headers: BTreeMap<String, String>,
}

impl HttpExecutor {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RunnerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RunnerError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
        })
    }

    /// Executor for the service under test: base URL, timeout and headers from config.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, RunnerError> {
        Ok(Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))?
            .with_headers(config.headers.clone()))
    }

    /// Headers sent with every request; per-request setup headers override them.
    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and return the body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-2xx status.
    pub fn fetch_raw(&self, path: &str) -> Result<String, RunnerError> {
        let url = self.url(path);
        let fetch_error = |reason: String| RunnerError::Fetch {
            url: url.clone(),
            reason,
        };
        let mut req = self.client.get(&url);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }
        let resp = req.send().map_err(|e| fetch_error(error_chain(&e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }
        resp.text().map_err(|e| fetch_error(error_chain(&e)))
    }

    /// Fetch and parse a JSON or YAML Swagger document.
    ///
    /// # Errors
    ///
    /// Returns error if the fetch fails or the document does not parse.
    pub fn fetch_document(&self, path: &str) -> Result<SwaggerDocument, RunnerError> {
        let content = self.fetch_raw(path)?;
        SwaggerDocument::parse_sniffed(&content).map_err(|source| RunnerError::Document {
            url: self.url(path),
            source,
        })
    }
}

impl Executor for HttpExecutor {
    fn execute(&self, request: &RequestSnapshot) -> Result<ResponseSnapshot, ExecutionError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            ExecutionError::InvalidRequest(format!("invalid HTTP method '{}'", request.method))
        })?;

        let mut req = self.client.request(method, self.url(&request.path));

        let mut headers = self.headers.clone();
        headers.extend(request.headers.clone());
        for (k, v) in &headers {
            if reqwest::header::HeaderValue::from_str(v).is_err() {
                return Err(ExecutionError::InvalidRequest(format!(
                    "header {k} has an invalid value"
                )));
            }
            req = req.header(k, v);
        }

        match &request.body {
            None => {}
            Some(serde_json::Value::String(raw)) => req = req.body(raw.clone()),
            Some(body) => req = req.json(body),
        }

        let resp = req.send().map_err(|e| classify(&e))?;
        let status_code = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = resp.text().map_err(|e| classify(&e))?;

        Ok(ResponseSnapshot {
            status_code,
            body,
            content_type,
        })
    }
}

fn classify(e: &reqwest::Error) -> ExecutionError {
    let message = error_chain(e);
    if e.is_timeout() {
        ExecutionError::Timeout(message)
    } else if e.is_connect() {
        ExecutionError::Connection(message)
    } else if e.is_builder() {
        ExecutionError::InvalidRequest(message)
    } else {
        ExecutionError::Transport(message)
    }
}

/// `e` and its sources joined with `": "`.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("HTTP client error: {0}")]
    Http(String),
    #[error("Cannot fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Invalid Swagger document at {url}: {source}")]
    Document {
        url: String,
        #[source]
        source: DocumentError,
    },
}
