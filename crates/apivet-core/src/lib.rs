//! apivet-core: Swagger contract model and conformance logic
//!
//! This crate parses Swagger documents, resolves per-endpoint setup data,
//! builds request paths, validates response bodies against schema fragments,
//! and compares shared models between services. It performs no I/O beyond
//! reading files; HTTP execution lives in `apivet-runner`.

pub mod audit;
pub mod config;
pub mod consistency;
pub mod document;
pub mod fragment;
pub mod generator;
pub mod path;
pub mod plan;
pub mod setup;
pub mod validate;
pub mod verdict;

pub use audit::run_audits;
pub use config::{Config, ConfigError, SetupRule};
pub use consistency::{Discrepancy, compare};
pub use document::{DocumentError, ResponseCase, SwaggerDocument};
pub use fragment::SchemaFragment;
pub use generator::to_http_file;
pub use path::{MissingParameterError, build_path};
pub use plan::Plan;
pub use setup::{SetupContext, SetupError, SetupKey, SetupRegistry, SubstitutionData};
pub use validate::{SchemaViolation, ViolationKind, validate};
pub use verdict::{
    DocumentCheck, EndpointCase, ExecutionError, Failure, Report, RequestSnapshot,
    ResponseSnapshot, Severity, Verdict, VerdictStatus,
};
