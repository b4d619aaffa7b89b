//! Embedding facade
//!
//! [`Sandbox`] acquires the runtime for every call and folds infrastructure
//! faults into failed results, so callers always get something renderable.

use crate::config::config::SandboxConfig;
use crate::config::types::{
    ExecutionResult, ExecutionStatus, Result, SandboxError, TestRunResult,
};
use crate::config::validator::validate_config;
use crate::exec::ExecutionSession;
use crate::judge::TestHarness;
use crate::observability::metrics::get_metrics;
use crate::runtime::{self, RuntimeHandle, RuntimeProvider};
use crate::vfs::FileSystemState;
use log::error;
use std::sync::Arc;

pub struct Sandbox {
    provider: Arc<RuntimeProvider>,
}

impl Sandbox {
    /// Sandbox with its own runtime provider
    pub fn new(config: SandboxConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self::with_provider(Arc::new(RuntimeProvider::new(config))))
    }

    pub fn with_provider(provider: Arc<RuntimeProvider>) -> Self {
        Self { provider }
    }

    /// Sandbox sharing the process-wide provider
    pub fn global() -> Self {
        Self::with_provider(runtime::global())
    }

    pub fn provider(&self) -> &Arc<RuntimeProvider> {
        &self.provider
    }

    pub fn config(&self) -> &SandboxConfig {
        self.provider.config()
    }

    /// Drop the current runtime; the next call bootstraps a fresh one
    pub fn reset_runtime(&self) -> bool {
        ExecutionSession::reset_runtime(&self.provider)
    }

    /// Mount the project and run its entry file
    pub fn execute(&self, state: &FileSystemState) -> ExecutionResult {
        self.with_session("entry run", |session| session.run_entry(state))
    }

    /// Mount the project and run the file at `path`
    pub fn execute_file(&self, state: &FileSystemState, path: &str) -> ExecutionResult {
        self.with_session("file run", |session| session.run_file(state, path))
    }

    /// Run source text against whatever is already mounted
    pub fn execute_source(&self, source: &str) -> ExecutionResult {
        self.with_session("inline run", |session| session.run(source))
    }

    /// Mount the project and run the hidden tests in `test_source`
    pub fn run_tests(&self, state: &FileSystemState, test_source: &str) -> TestRunResult {
        let outcome = self
            .provider
            .acquire()
            .and_then(|handle| TestHarness::new(&handle).run_tests(state, test_source));

        match outcome {
            Ok(result) => result,
            Err(e) => TestRunResult {
                run: fold_error("test run", e),
                test_results: Vec::new(),
            },
        }
    }

    fn with_session<F>(&self, what: &str, f: F) -> ExecutionResult
    where
        F: FnOnce(&ExecutionSession<'_>) -> Result<ExecutionResult>,
    {
        let outcome = self
            .provider
            .acquire()
            .and_then(|handle: Arc<RuntimeHandle>| f(&ExecutionSession::new(&handle)));

        outcome.unwrap_or_else(|e| fold_error(what, e))
    }
}

fn fold_error(what: &str, e: SandboxError) -> ExecutionResult {
    error!("{} failed: {}", what, e);
    let status = e.status();
    // Timeouts are already counted by the session
    if status != ExecutionStatus::TimeLimit {
        get_metrics().record_execution(status);
    }
    ExecutionResult::failure(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = SandboxConfig {
            test_prefix: String::new(),
            ..Default::default()
        };
        assert!(matches!(Sandbox::new(config), Err(SandboxError::Config(_))));
    }

    #[test]
    fn test_fold_error_is_internal_failure() {
        let result = fold_error("probe", SandboxError::RuntimeUnavailable("down".into()));
        assert!(!result.success);
        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.error.as_deref(), Some("Runtime unavailable: down"));
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_reset_without_runtime_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(SandboxConfig {
            runtime_root: dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        assert!(!sandbox.reset_runtime());
        assert!(sandbox.provider().current().is_none());
    }
}
