//! End-to-end checks against a stub HTTP service on a loopback port

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use apivet_core::Config;
use apivet_core::setup::{SetupKey, SetupRegistry};
use apivet_core::verdict::{ExecutionError, Failure, RequestSnapshot};
use apivet_runner::{Executor, HttpExecutor, RunnerError, ServiceValidation};
use serde_json::{Value, json};

type Route = fn(&str, &str) -> (u16, String);

/// Serve `route` on an ephemeral port until the test process exits.
fn serve(route: Route) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            handle(stream, route);
        }
    });
    format!("http://{addr}")
}

fn handle(mut stream: TcpStream, route: Route) {
    let Some((method, path)) = read_request(&stream) else {
        return;
    };
    let (status, body) = route(&method, &path);
    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

fn read_request(stream: &TcpStream) -> Option<(String, String)> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        if line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    let mut parts = request_line.split_whitespace();
    Some((parts.next()?.to_string(), parts.next()?.to_string()))
}

fn pet_definition(id_type: &str) -> Value {
    json!({
        "type": "object",
        "required": ["id", "name"],
        "properties": {"id": {"type": id_type}, "name": {"type": "string"}}
    })
}

fn local_document() -> Value {
    json!({
        "swagger": "2.0",
        "info": {"title": "Pets", "version": "1.0"},
        "basePath": "/api",
        "paths": {
            "/pets": {"get": {"responses": {
                "200": {"description": "ok", "schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}}
            }}},
            "/pets/{id}": {"get": {"responses": {
                "200": {"description": "ok", "schema": {"$ref": "#/definitions/Pet"}},
                "404": {"description": "missing"}
            }}}
        },
        "definitions": {"Pet": pet_definition("integer")}
    })
}

fn pets_service(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/swagger.json") => (200, local_document().to_string()),
        ("GET", "/api/pets") => (200, r#"[{"id": "x", "name": "rex"}]"#.to_string()),
        ("GET", "/api/pets/1") => (200, r#"{"id": 1, "name": "rex"}"#.to_string()),
        _ => (404, r#"{"error": "not found"}"#.to_string()),
    }
}

fn master_service(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/swagger.json") => {
            let doc = json!({
                "swagger": "2.0",
                "info": {"title": "Master", "version": "1.0"},
                "paths": {},
                "definitions": {"Pet": pet_definition("string")}
            });
            (200, doc.to_string())
        }
        _ => (404, String::new()),
    }
}

fn config(base_url: String, master_url: Option<String>) -> Config {
    let mut config: Config = toml::from_str(&format!(
        r#"
base_url = "{base_url}"
timeout_secs = 5

[[setup]]
params = {{ id = 1 }}

[[setup]]
code = "404"
params = {{ id = 999 }}
"#
    ))
    .unwrap();
    config.master_url = master_url;
    config
}

/// A port nothing listens on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[test]
fn validates_service_and_compares_with_master() {
    let config = config(serve(pets_service), Some(serve(master_service)));
    let report = ServiceValidation::new(&config).run().unwrap();

    insta::assert_snapshot!(report.to_terminal(false), @r"
    Document checks:
      [OK] document is a valid Swagger 2.0 document
      [OK] every GET endpoint with a 200 response has a referenced model
      [WARNING] shared models match the master document
             Pet: properties.id.type: expected string, found integer

    Endpoints:
      [ERROR] GET /pets 200
             body does not match schema: /0/id: expected integer, found string
      [OK] GET /pets/{id} 200
      [OK] GET /pets/{id} 404

    FAIL: 3 endpoints, 2 passed, 1 failed; 1 document checks failed
    ");
    assert_eq!(report.exit_code(false), 1);
    assert_eq!(report.verdicts[2].built_path(), Some("/api/pets/999"));
}

#[test]
fn unreachable_master_is_only_a_warning() {
    let config = config(serve(pets_service), Some(closed_port_url()));
    let report = ServiceValidation::new(&config).run().unwrap();
    let master = report.document_checks.last().unwrap();
    assert_eq!(master.name, "consistent_with_master");
    assert!(!master.passed);
    assert!(master.details[0].starts_with("Cannot fetch"));
}

#[test]
fn unreachable_service_is_fatal() {
    let config = config(closed_port_url(), None);
    let err = ServiceValidation::new(&config).run().unwrap_err();
    assert!(matches!(err, RunnerError::Fetch { .. }), "{err}");
}

#[test]
fn refused_connection_is_an_execution_error() {
    let exec = HttpExecutor::new(&closed_port_url(), Duration::from_secs(2)).unwrap();
    let err = exec
        .execute(&RequestSnapshot {
            method: "GET".into(),
            path: "/api/pets".into(),
            headers: Default::default(),
            body: None,
        })
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Connection(_)), "{err}");
}

#[test]
fn http_error_status_is_a_response_not_an_error() {
    let exec = HttpExecutor::new(&serve(pets_service), Duration::from_secs(2)).unwrap();
    let response = exec
        .execute(&RequestSnapshot {
            method: "DELETE".into(),
            path: "/api/pets/1".into(),
            headers: Default::default(),
            body: Some(json!({"reason": "test"})),
        })
        .unwrap();
    assert_eq!(response.status_code, 404);
    assert_eq!(response.content_type.as_deref(), Some("application/json"));
}

#[test]
fn service_without_setup_reports_missing_parameters() {
    let mut config = config(serve(pets_service), None);
    config.setup.clear();
    let report = ServiceValidation::new(&config).run().unwrap();
    let missing: Vec<&str> = report
        .verdicts
        .iter()
        .filter_map(|v| match &v.failure {
            Some(Failure::MissingParameter(e)) => Some(e.parameter.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec!["id", "id"]);
    assert_eq!(report.document_checks.len(), 2);
}

#[test]
fn computed_setup_rules_replace_config_rules() {
    let mut config = config(serve(pets_service), None);
    config.setup.clear();
    let mut setups = SetupRegistry::new();
    setups.register(SetupKey::base(), |ctx| {
        if ctx.code == "404" {
            json!({"id": 999})
        } else {
            json!({"id": 1})
        }
    });
    let report = ServiceValidation::new(&config)
        .with_setups(setups)
        .run()
        .unwrap();
    assert_eq!(report.verdicts[1].built_path(), Some("/api/pets/1"));
    assert_eq!(report.verdicts[2].built_path(), Some("/api/pets/999"));
    assert!(report.verdicts[1].passed() && report.verdicts[2].passed());
}
