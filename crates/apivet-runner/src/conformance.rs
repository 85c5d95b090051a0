//! Conformance runner
//!
//! Walks every declared (path, method, code) triple of a document, builds the
//! request from setup data, hands it to an [`Executor`] and turns the response
//! into a [`Verdict`]. One failing endpoint never stops the others.

use apivet_core::document::{ResponseCase, SwaggerDocument};
use apivet_core::path::build_path;
use apivet_core::setup::SetupRegistry;
use apivet_core::validate::validate;
use apivet_core::verdict::{
    EndpointCase, ExecutionError, Failure, RequestSnapshot, ResponseSnapshot, Verdict,
};

/// Body bytes quoted in a malformed-body failure.
const MAX_EXCERPT_BYTES: usize = 200;

/// Sends one request and returns the raw response.
///
/// An HTTP error status is a response, not an error; `Err` means the request
/// could not be completed at all.
pub trait Executor {
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or its response read.
    fn execute(&self, request: &RequestSnapshot) -> Result<ResponseSnapshot, ExecutionError>;
}

impl<F> Executor for F
where
    F: Fn(&RequestSnapshot) -> Result<ResponseSnapshot, ExecutionError>,
{
    fn execute(&self, request: &RequestSnapshot) -> Result<ResponseSnapshot, ExecutionError> {
        self(request)
    }
}

/// Checks a document's declared responses against a live service.
pub struct ConformanceRunner<'a> {
    document: &'a SwaggerDocument,
    setups: &'a SetupRegistry,
    progress: bool,
}

impl<'a> ConformanceRunner<'a> {
    #[must_use]
    pub const fn new(document: &'a SwaggerDocument, setups: &'a SetupRegistry) -> Self {
        Self {
            document,
            setups,
            progress: false,
        }
    }

    /// Print one line per endpoint to stderr.
    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// One verdict per declared response, in enumeration order.
    pub fn run<E: Executor + ?Sized>(&self, executor: &E) -> Vec<Verdict> {
        if self.progress {
            eprintln!(
                "Checking {} declared responses...",
                self.document.produce_responses().count()
            );
        }

        self.document
            .produce_responses()
            .map(|case| {
                let verdict = self.check(case, executor);
                if self.progress {
                    match &verdict.failure {
                        None => eprintln!("  {}: OK", verdict.case.label()),
                        Some(failure) => {
                            eprintln!("  {}: FAIL ({})", verdict.case.label(), failure.kind());
                        }
                    }
                }
                verdict
            })
            .collect()
    }

    fn check<E: Executor + ?Sized>(&self, case: ResponseCase<'_>, executor: &E) -> Verdict {
        let endpoint = EndpointCase::from(&case);
        let data = self.setups.resolve(case.path, case.method, case.code);

        let built = match build_path(case.path, &data) {
            Ok(built) => built,
            Err(e) => return Verdict::fail(endpoint, None, None, Failure::MissingParameter(e)),
        };

        let request = RequestSnapshot {
            method: case.method.to_ascii_uppercase(),
            path: format!("{}{built}", self.document.base_path()),
            headers: data.headers(),
            body: data.data().cloned(),
        };

        let response = match executor.execute(&request) {
            Ok(response) => response,
            Err(error) => {
                let failure = Failure::Execution {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    error,
                };
                return Verdict::fail(endpoint, Some(request), None, failure);
            }
        };

        if let Some(failure) = check_response(&case, &response, self.document) {
            return Verdict::fail(endpoint, Some(request), Some(response), failure);
        }
        Verdict::pass(endpoint, request, response)
    }
}

/// Status first, then body shape when the response declares a schema.
fn check_response(
    case: &ResponseCase<'_>,
    response: &ResponseSnapshot,
    document: &SwaggerDocument,
) -> Option<Failure> {
    if !case.expects(response.status_code) {
        return Some(Failure::StatusMismatch {
            expected: case.code.to_string(),
            actual: response.status_code,
        });
    }

    let fragment = case.fragment?;
    let body: serde_json::Value = match serde_json::from_str(&response.body) {
        Ok(body) => body,
        Err(e) => {
            return Some(Failure::MalformedBody {
                reason: format!("{e} (body: {:?})", excerpt(&response.body)),
            });
        }
    };
    validate(&body, Some(fragment), document)
        .err()
        .map(|violations| Failure::SchemaViolation { violations })
}

fn excerpt(body: &str) -> String {
    if body.len() <= MAX_EXCERPT_BYTES {
        return body.to_string();
    }
    let mut end = MAX_EXCERPT_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…({} bytes total)", &body[..end], body.len())
}

/// Run every declared response of `document` through `executor`.
pub fn run<E: Executor + ?Sized>(
    document: &SwaggerDocument,
    executor: &E,
    setups: &SetupRegistry,
) -> Vec<Verdict> {
    ConformanceRunner::new(document, setups).run(executor)
}
