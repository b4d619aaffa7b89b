//! Test harness: run a hidden test module against the learner's project.

use crate::config::types::{OutcomeKind, Result, SandboxError, TestRunResult};
use crate::exec::ExecutionSession;
use crate::judge::driver::{render_driver, REPORT_GLOBAL};
use crate::judge::report::parse_report;
use crate::observability::metrics::get_metrics;
use crate::runtime::interpreter::ExecRequest;
use crate::runtime::RuntimeHandle;
use crate::vfs::FileSystemState;
use log::{info, warn};
use std::fs;
use std::time::Duration;

const DRIVER_FILENAME: &str = "<pybox-driver>";

pub struct TestHarness<'a> {
    session: ExecutionSession<'a>,
    module: String,
    module_file: String,
    prefix: String,
}

impl<'a> TestHarness<'a> {
    pub fn new(runtime: &'a RuntimeHandle) -> Self {
        let config = runtime.config();
        Self {
            session: ExecutionSession::new(runtime),
            module: config.test_module.clone(),
            module_file: config.test_module_file(),
            prefix: config.test_prefix.clone(),
        }
    }

    pub fn with_timeout(mut self, budget: Option<Duration>) -> Self {
        self.session = self.session.with_timeout(budget);
        self
    }

    /// Mount `state`, write `test_source` as the reserved test module, and
    /// run every discovered test.
    ///
    /// `success` is true only if the module imported and every test passed;
    /// an empty suite succeeds. A module that fails to import yields the
    /// error with no outcomes.
    ///
    /// A project file named like the reserved test module is refused, and
    /// the test module is removed again once the driver returns.
    pub fn run_tests(&self, state: &FileSystemState, test_source: &str) -> Result<TestRunResult> {
        if let Some(clash) = state.files().find(|f| f.name == self.module_file) {
            return Err(SandboxError::Mount(format!(
                "{} uses the name reserved for the test module",
                clash.path
            )));
        }

        let runtime = self.session.runtime();
        let mut lease = runtime.lease()?;
        self.session.mounter().mount_with(&mut lease, state)?;

        let module_path = runtime.project_root().join(&self.module_file);
        fs::write(&module_path, test_source).map_err(|e| {
            SandboxError::Mount(format!(
                "Failed to write test module {}: {}",
                module_path.display(),
                e
            ))
        })?;

        let driver = render_driver(&self.module, &self.prefix, REPORT_GLOBAL);
        let request = ExecRequest {
            filename: DRIVER_FILENAME.to_string(),
            ..ExecRequest::inline(driver)
        }
        .with_probe(REPORT_GLOBAL);
        let capture = self.session.execute(&mut lease, request);
        if let Err(e) = fs::remove_file(&module_path) {
            warn!("Failed to remove test module {}: {}", module_path.display(), e);
        }
        drop(lease);
        let capture = capture?;

        let test_results = match capture.probe {
            Some(raw) => parse_report(&raw)?,
            None => Vec::new(),
        };

        let metrics = get_metrics();
        for outcome in &test_results {
            metrics.record_test(outcome.kind);
        }

        let mut run = capture.result;
        run.success = run.success && test_results.iter().all(|t| t.passed);

        let passed = test_results
            .iter()
            .filter(|t| t.kind == OutcomeKind::Passed)
            .count();
        info!(
            "{}/{} tests passed on runtime {} ({})",
            passed,
            test_results.len(),
            runtime.id(),
            run.status
        );

        Ok(TestRunResult { run, test_results })
    }
}
