//! HTTP file generator - converts failed verdicts to .http format

use crate::verdict::{RequestSnapshot, Verdict};

/// Generate .http file content from the failed verdicts that sent a request.
#[must_use]
pub fn to_http_file(verdicts: &[Verdict], base_url_var: &str) -> String {
    let failed: Vec<(&Verdict, &RequestSnapshot)> = verdicts
        .iter()
        .filter(|v| !v.passed())
        .filter_map(|v| v.request.as_ref().map(|r| (v, r)))
        .collect();

    let mut lines = Vec::new();

    lines.push(format!("# Reproduction cases ({} failures)", failed.len()));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for (idx, (verdict, request)) in failed.iter().enumerate() {
        let kind = verdict.failure.as_ref().map_or("", |f| f.kind());
        let severity = verdict.severity().map_or("", |s| s.as_str());
        lines.push(format!("### [{idx}] {severity} - {kind} - {}", verdict.case.label()));
        if let Some(failure) = &verdict.failure {
            lines.push(format!("# {failure}"));
        }

        lines.push(request_to_http(request, base_url_var));
        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// A single request as .http lines, relative to `{{base_url_var}}`.
#[must_use]
pub fn request_to_http(request: &RequestSnapshot, base_url_var: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!("{} {{{{{base_url_var}}}}}{}", request.method, request.path));

    for (key, value) in &request.headers {
        if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
            lines.push(format!("{key}: {value}"));
        }
    }

    if let Some(body) = &request.body {
        let body = match body {
            serde_json::Value::String(s) => s.clone(),
            other => {
                if !request
                    .headers
                    .keys()
                    .any(|k| k.eq_ignore_ascii_case("content-type"))
                {
                    lines.push("Content-Type: application/json".to_string());
                }
                other.to_string()
            }
        };
        lines.push(String::new());
        lines.push(body);
    }

    lines.join("\n")
}
