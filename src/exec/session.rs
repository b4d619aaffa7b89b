//! Execution sessions: run one program on a mounted runtime and capture what it prints.

use crate::config::types::{ExecutionResult, ExecutionStatus, OutputIntegrity, Result, SandboxError};
use crate::observability::metrics::get_metrics;
use crate::runtime::interpreter::{ExecOutcome, ExecRequest, FailureKind};
use crate::runtime::{ProjectMounter, RuntimeHandle, RuntimeProvider, SessionLease};
use crate::utils::output::OutputBuffer;
use crate::vfs::{FileSystemState, Language, VirtualFile};
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Result of a run plus the probed global, if one was requested
pub(crate) struct RunCapture {
    pub result: ExecutionResult,
    pub probe: Option<String>,
}

/// Runs programs on one runtime.
///
/// Every public operation holds the runtime's session lease from mount to
/// output restore, so concurrent sessions on the same runtime serialize.
pub struct ExecutionSession<'a> {
    runtime: &'a RuntimeHandle,
    mounter: ProjectMounter,
    timeout: Option<Duration>,
    output_limit: usize,
    entry_language: Language,
}

impl<'a> ExecutionSession<'a> {
    pub fn new(runtime: &'a RuntimeHandle) -> Self {
        let config = runtime.config();
        Self {
            runtime,
            mounter: ProjectMounter::from_config(config),
            timeout: config.exec_timeout(),
            output_limit: config.output_limit_bytes,
            entry_language: Language::from_name(&config.entry_language)
                .unwrap_or(Language::Python),
        }
    }

    /// Override the configured wall-clock budget
    pub fn with_timeout(mut self, budget: Option<Duration>) -> Self {
        self.timeout = budget;
        self
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    pub fn runtime(&self) -> &'a RuntimeHandle {
        self.runtime
    }

    pub(crate) fn mounter(&self) -> &ProjectMounter {
        &self.mounter
    }

    /// Run source text as `__main__` against whatever is currently mounted
    pub fn run(&self, source: &str) -> Result<ExecutionResult> {
        let mut lease = self.runtime.lease()?;
        Ok(self.execute(&mut lease, ExecRequest::inline(source))?.result)
    }

    /// Mount the project, then run its entry file.
    ///
    /// The entry is the file flagged `is_entry`, else the first file in the
    /// entry language. A project without one yields a failed result.
    pub fn run_entry(&self, state: &FileSystemState) -> Result<ExecutionResult> {
        let mut lease = self.runtime.lease()?;
        self.mounter.mount_with(&mut lease, state)?;

        match state.entry_file(self.entry_language) {
            Some(entry) => Ok(self.execute(&mut lease, self.mounted_request(entry))?.result),
            None => {
                get_metrics().record_execution(ExecutionStatus::NoEntry);
                Ok(ExecutionResult::failure(
                    ExecutionStatus::NoEntry,
                    "No Python file found to execute",
                ))
            }
        }
    }

    /// Mount the project, then run the file at `path`
    pub fn run_file(&self, state: &FileSystemState, path: &str) -> Result<ExecutionResult> {
        let mut lease = self.runtime.lease()?;
        self.mounter.mount_with(&mut lease, state)?;

        match state.file(path) {
            Some(file) => Ok(self.execute(&mut lease, self.mounted_request(file))?.result),
            None => {
                get_metrics().record_execution(ExecutionStatus::NoEntry);
                Ok(ExecutionResult::failure(
                    ExecutionStatus::NoEntry,
                    format!("File not found: {}", path),
                ))
            }
        }
    }

    /// Discard the provider's runtime so the next acquire starts from scratch
    pub fn reset_runtime(provider: &RuntimeProvider) -> bool {
        provider.reset()
    }

    fn mounted_request(&self, file: &VirtualFile) -> ExecRequest {
        let path = self.runtime.project_root().join(&file.name);
        ExecRequest::mounted(file.content.clone(), path.display().to_string())
    }

    /// Execute on the worker while `lease` is held
    pub(crate) fn execute(
        &self,
        lease: &mut SessionLease<'_>,
        request: ExecRequest,
    ) -> Result<RunCapture> {
        let metrics = get_metrics();
        let output = OutputBuffer::new(self.output_limit);
        let sink = output.clone();
        debug!("executing {} on runtime {}", request.filename, lease.handle().id());

        metrics.active_executions.inc();
        let started = Instant::now();
        let outcome = lease
            .handle()
            .call(self.timeout, move |engine| engine.execute(&request, &sink));
        let elapsed = started.elapsed();
        metrics.active_executions.dec();

        let capture = match outcome {
            Ok(outcome) => build_capture(outcome, &output, elapsed),
            Err(SandboxError::TimedOut { budget_ms }) => {
                warn!("execution exceeded {} ms budget", budget_ms);
                metrics.runtime_timeouts.inc();
                RunCapture {
                    result: ExecutionResult {
                        success: false,
                        output: output.snapshot(),
                        error: Some(format!("Execution timed out after {} ms", budget_ms)),
                        status: ExecutionStatus::TimeLimit,
                        wall_time_ms: elapsed.as_millis() as u64,
                        output_integrity: output.integrity(),
                    },
                    probe: None,
                }
            }
            Err(e) => return Err(e),
        };

        metrics.record_execution(capture.result.status);
        metrics.execution_duration.observe(elapsed);
        Ok(capture)
    }
}

fn build_capture(outcome: ExecOutcome, output: &OutputBuffer, elapsed: Duration) -> RunCapture {
    let (status, error) = match outcome.failure {
        None => (ExecutionStatus::Ok, None),
        Some(failure) => {
            let status = match failure.kind {
                FailureKind::Compile => ExecutionStatus::CompileError,
                FailureKind::Runtime => ExecutionStatus::RuntimeError,
                FailureKind::Internal => ExecutionStatus::InternalError,
            };
            (status, Some(failure.message))
        }
    };

    let integrity = output.integrity();
    if integrity == OutputIntegrity::TruncatedByLimit {
        get_metrics().output_truncations.inc();
    }

    RunCapture {
        result: ExecutionResult {
            success: error.is_none(),
            output: output.snapshot(),
            error,
            status,
            wall_time_ms: elapsed.as_millis() as u64,
            output_integrity: integrity,
        },
        probe: outcome.probe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::ExecFailure;

    #[test]
    fn test_capture_keeps_partial_output_on_failure() {
        let output = OutputBuffer::new(64);
        output.write_str("before\n");
        let outcome = ExecOutcome {
            failure: Some(ExecFailure {
                kind: FailureKind::Runtime,
                message: "ZeroDivisionError: division by zero".to_string(),
            }),
            probe: None,
        };

        let capture = build_capture(outcome, &output, Duration::from_millis(5));
        assert!(!capture.result.success);
        assert_eq!(capture.result.output, "before\n");
        assert_eq!(capture.result.status, ExecutionStatus::RuntimeError);
        assert!(capture.result.error.unwrap().contains("division"));
    }

    #[test]
    fn test_capture_maps_compile_failures() {
        let outcome = ExecOutcome {
            failure: Some(ExecFailure {
                kind: FailureKind::Compile,
                message: "invalid syntax".to_string(),
            }),
            probe: None,
        };
        let capture = build_capture(outcome, &OutputBuffer::new(8), Duration::ZERO);
        assert_eq!(capture.result.status, ExecutionStatus::CompileError);
    }

    #[test]
    fn test_capture_reports_truncation() {
        let output = OutputBuffer::new(3);
        output.write_str("abcdef");
        let capture = build_capture(
            ExecOutcome {
                failure: None,
                probe: Some("report".to_string()),
            },
            &output,
            Duration::ZERO,
        );
        assert!(capture.result.success);
        assert_eq!(capture.result.output, "abc");
        assert_eq!(capture.result.output_integrity, OutputIntegrity::TruncatedByLimit);
        assert_eq!(capture.probe.as_deref(), Some("report"));
    }
}
