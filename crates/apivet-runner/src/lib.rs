//! apivet-runner: executes Swagger conformance checks against live services

pub mod conformance;
pub mod http;
pub mod service;

pub use conformance::{ConformanceRunner, Executor, run};
pub use http::{HttpExecutor, RunnerError};
pub use service::ServiceValidation;
