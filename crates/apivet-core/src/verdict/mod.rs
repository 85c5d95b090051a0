//! Verdict module - per-endpoint outcomes, severity, and the run report

mod failure;
mod report;
mod severity;

pub use failure::{
    EndpointCase, ExecutionError, Failure, RequestSnapshot, ResponseSnapshot, Verdict,
};
pub use report::{DocumentCheck, Report, ReportSummary, VerdictStatus, generate_schema};
pub use severity::Severity;
