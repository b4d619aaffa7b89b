use crate::config::types::{MountPolicy, Result, SandboxError};
/// Configuration loading from pybox.json
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reserved module name the harness writes test source under
pub const DEFAULT_TEST_MODULE: &str = "__mission_tests__";
/// Prefix that marks a module attribute as a test
pub const DEFAULT_TEST_PREFIX: &str = "test_";
/// Default file name looked up by [`SandboxConfig::load_default`]
pub const CONFIG_FILE_NAME: &str = "pybox.json";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory holding per-runtime project roots
    pub runtime_root: PathBuf,
    /// Module name the test source is mounted as (without `.py`)
    pub test_module: String,
    /// Attribute prefix for test discovery
    pub test_prefix: String,
    /// Language whose first file is chosen as entry when none is flagged
    pub entry_language: String,
    /// Wall-clock budget per run; `None` waits indefinitely
    pub exec_timeout_ms: Option<u64>,
    /// Captured output limit in bytes
    pub output_limit_bytes: usize,
    /// Handling of files left over from earlier mounts
    pub mount_policy: MountPolicy,
    /// Extra directories appended to the interpreter search path at bootstrap
    pub stdlib_paths: Vec<PathBuf>,
    /// Stack size of the interpreter worker thread
    pub worker_stack_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime_root: std::env::temp_dir().join("pybox"),
            test_module: DEFAULT_TEST_MODULE.to_string(),
            test_prefix: DEFAULT_TEST_PREFIX.to_string(),
            entry_language: "python".to_string(),
            exec_timeout_ms: None,
            output_limit_bytes: 1024 * 1024, // 1 MB
            mount_policy: MountPolicy::Accumulate,
            stdlib_paths: Vec::new(),
            worker_stack_bytes: 32 * 1024 * 1024, // 32 MB, deep recursion in user code
        }
    }
}

impl SandboxConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: SandboxConfig = serde_json::from_str(&config_content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config JSON: {}", e)))?;

        Ok(config)
    }

    /// Load ./pybox.json when present, defaults otherwise
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| SandboxError::Config(format!("Failed to get current directory: {}", e)))?
            .join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("{} not found, using built-in defaults", CONFIG_FILE_NAME);
            return Ok(Self::default());
        }

        Self::load_from_file(config_path)
    }

    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_ms.map(Duration::from_millis)
    }

    /// File name the test module is written under
    pub fn test_module_file(&self) -> String {
        format!("{}.py", self.test_module)
    }
}
