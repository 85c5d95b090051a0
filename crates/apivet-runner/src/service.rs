//! Whole-service validation: document checks, master comparison, conformance

use std::time::Duration;

use apivet_core::Config;
use apivet_core::audit::{CONSISTENT_WITH_MASTER, check_consistency, run_audits};
use apivet_core::consistency::compare;
use apivet_core::document::SwaggerDocument;
use apivet_core::setup::SetupRegistry;
use apivet_core::verdict::{DocumentCheck, Report, Severity};

use crate::conformance::ConformanceRunner;
use crate::http::{HttpExecutor, RunnerError};

/// Validate one running service against its own published contract.
pub struct ServiceValidation<'a> {
    config: &'a Config,
    setups: SetupRegistry,
    progress: bool,
}

impl<'a> ServiceValidation<'a> {
    /// Setup rules come from the config's `[[setup]]` tables.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            setups: config.setup_registry(),
            progress: false,
        }
    }

    /// Replace the setup rules, e.g. with computed ones registered in code.
    #[must_use]
    pub fn with_setups(mut self, setups: SetupRegistry) -> Self {
        self.setups = setups;
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch the service's document, audit it, compare it with the master
    /// when one is configured, then check every declared response.
    ///
    /// # Errors
    ///
    /// Returns error if the service's own document cannot be fetched or parsed.
    /// An unreachable master only fails the advisory check.
    pub fn run(&self) -> Result<Report, RunnerError> {
        let executor = HttpExecutor::from_config(self.config)?;
        if self.progress {
            eprintln!(
                "Fetching {}{}...",
                executor.base_url(),
                self.config.swagger_path
            );
        }
        let document = executor.fetch_document(&self.config.swagger_path)?;

        let mut document_checks = run_audits(&document);
        if let Some(master_url) = &self.config.master_url {
            document_checks.push(self.check_master(master_url, &document));
        }

        let verdicts = ConformanceRunner::new(&document, &self.setups)
            .with_progress(self.progress)
            .run(&executor);

        Ok(Report {
            document_checks,
            verdicts,
        })
    }

    fn check_master(&self, master_url: &str, local: &SwaggerDocument) -> DocumentCheck {
        if self.progress {
            eprintln!("Comparing with {master_url}{}...", self.config.master_swagger_path);
        }
        let master = HttpExecutor::new(master_url, Duration::from_secs(self.config.timeout_secs))
            .and_then(|m| m.fetch_document(&self.config.master_swagger_path));
        match master {
            Ok(master) => {
                check_consistency(&compare(local, &master, self.config.service.as_deref()))
            }
            Err(e) => DocumentCheck::fail(
                CONSISTENT_WITH_MASTER,
                "shared models match the master document",
                Severity::Warning,
                vec![e.to_string()],
            ),
        }
    }
}
