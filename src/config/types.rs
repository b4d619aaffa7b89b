/// Core types and structures shared across the pybox engine
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Execution result for a single program run
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Success flag
    pub success: bool,
    /// Captured standard output (partial when the program failed)
    pub output: String,
    /// First uncaught error, rendered as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Execution status
    #[serde(default)]
    pub status: ExecutionStatus,
    /// Wall clock time spent inside the interpreter (milliseconds)
    #[serde(default)]
    pub wall_time_ms: u64,
    /// Output integrity state from the capture buffer
    #[serde(default)]
    pub output_integrity: OutputIntegrity,
}

impl ExecutionResult {
    /// Failed result that never reached the interpreter
    pub fn failure(status: ExecutionStatus, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            status,
            wall_time_ms: 0,
            output_integrity: OutputIntegrity::Complete,
        }
    }
}

/// Status of a run - closed taxonomy
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    /// Program finished without an uncaught exception
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// Uncaught exception at runtime
    #[serde(rename = "RE")]
    RuntimeError,
    /// Source failed to compile
    #[serde(rename = "CE")]
    CompileError,
    /// Wall-clock budget exceeded
    #[serde(rename = "TLE")]
    TimeLimit,
    /// Project contains nothing runnable
    #[serde(rename = "NOENTRY")]
    NoEntry,
    /// Internal error (runtime infrastructure failure)
    #[serde(rename = "IE")]
    InternalError,
}

impl ExecutionStatus {
    pub fn code(self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "OK",
            ExecutionStatus::RuntimeError => "RE",
            ExecutionStatus::CompileError => "CE",
            ExecutionStatus::TimeLimit => "TLE",
            ExecutionStatus::NoEntry => "NOENTRY",
            ExecutionStatus::InternalError => "IE",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Output integrity classification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OutputIntegrity {
    #[default]
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_limit")]
    TruncatedByLimit,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
        }
    }
}

/// How a single discovered test ended
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Passed,
    /// Raised `AssertionError`
    Failed,
    /// Raised any other exception
    Errored,
}

/// Outcome of one test function
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    /// "OK" on success, otherwise the exception text
    pub message: String,
    pub kind: OutcomeKind,
}

/// Result of a test run: the execution result plus per-test outcomes
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    #[serde(flatten)]
    pub run: ExecutionResult,
    /// Outcomes in discovery order
    pub test_results: Vec<TestOutcome>,
}

impl TestRunResult {
    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn total(&self) -> usize {
        self.test_results.len()
    }
}

/// What the mounter does with files from earlier mounts that are absent now
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MountPolicy {
    /// Leave them in place
    #[default]
    Accumulate,
    /// Delete them so the runtime mirrors the snapshot
    Reconcile,
}

/// Errors signalled by virtual filesystem operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("A file already exists at {0}")]
    DuplicatePath(String),

    #[error("Filesystem state invariant violated: {0}")]
    InvariantViolated(String),
}

/// Custom error types for pybox
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Runtime bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Execution exceeded its {budget_ms} ms budget")]
    TimedOut { budget_ms: u64 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl SandboxError {
    /// Status a caller-facing result should carry for this error
    pub fn status(&self) -> ExecutionStatus {
        match self {
            SandboxError::TimedOut { .. } => ExecutionStatus::TimeLimit,
            _ => ExecutionStatus::InternalError,
        }
    }

    pub(crate) fn timed_out(budget: Duration) -> Self {
        SandboxError::TimedOut {
            budget_ms: budget.as_millis() as u64,
        }
    }
}

/// Result type alias for pybox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_to_short_codes() {
        let json = serde_json::to_string(&ExecutionStatus::TimeLimit).unwrap();
        assert_eq!(json, "\"TLE\"");
        let parsed: ExecutionStatus = serde_json::from_str("\"NOENTRY\"").unwrap();
        assert_eq!(parsed, ExecutionStatus::NoEntry);
        assert_eq!(ExecutionStatus::CompileError.to_string(), "CE");
    }

    #[test]
    fn test_execution_result_uses_camel_case_and_omits_missing_error() {
        let result = ExecutionResult {
            success: true,
            output: "hi\n".to_string(),
            wall_time_ms: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["wallTimeMs"], 3);
        assert_eq!(json["outputIntegrity"], "complete");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_run_result_flattens_execution_fields() {
        let result = TestRunResult {
            run: ExecutionResult {
                success: false,
                ..Default::default()
            },
            test_results: vec![TestOutcome {
                name: "test_a".to_string(),
                passed: false,
                message: "boom".to_string(),
                kind: OutcomeKind::Errored,
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["testResults"][0]["kind"], "errored");
        assert_eq!(result.passed_count(), 0);
        assert_eq!(result.total(), 1);
    }

    #[test]
    fn test_error_status_mapping() {
        let err = SandboxError::timed_out(Duration::from_millis(250));
        assert_eq!(err.status(), ExecutionStatus::TimeLimit);
        assert_eq!(err.to_string(), "Execution exceeded its 250 ms budget");
        assert_eq!(
            SandboxError::Mount("x".into()).status(),
            ExecutionStatus::InternalError
        );
    }

    #[test]
    fn test_output_integrity_display() {
        assert_eq!(format!("{}", OutputIntegrity::Complete), "complete");
        assert_eq!(
            format!("{}", OutputIntegrity::TruncatedByLimit),
            "truncated_by_limit"
        );
    }
}
