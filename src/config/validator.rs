// Config validation
// Configuration is checked once at startup; invalid settings fail fast with actionable errors.

use crate::config::config::SandboxConfig;
use crate::config::types::{Result, SandboxError};
use crate::vfs::Language;

/// Output limits above this are accepted but flagged
const LARGE_OUTPUT_LIMIT: usize = 64 * 1024 * 1024;
/// Worker stacks below this overflow on modest recursion
const MIN_WORKER_STACK: usize = 1024 * 1024;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate config at startup. Any error is fatal; warnings are logged.
pub fn validate_config(config: &SandboxConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_names(config, &mut result);
    validate_limits(config, &mut result);
    validate_paths(config, &mut result);

    if !result.is_valid() {
        return Err(SandboxError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    for warning in &result.warnings {
        log::warn!("config: {}", warning);
    }

    Ok(result)
}

/// True for names usable as a Python module or attribute prefix
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn validate_names(config: &SandboxConfig, result: &mut ValidationResult) {
    if !is_identifier(&config.test_module) {
        result.add_error(format!(
            "test_module must be a valid module name: {:?}",
            config.test_module
        ));
    }

    if !is_identifier(&config.test_prefix) {
        result.add_error(format!(
            "test_prefix must be a non-empty identifier prefix: {:?}",
            config.test_prefix
        ));
    }

    match Language::from_name(&config.entry_language) {
        Some(Language::PlainText) | None => result.add_error(format!(
            "entry_language is not a known source language: {:?}",
            config.entry_language
        )),
        Some(Language::Python) => {}
        Some(other) => result.add_warning(format!(
            "entry_language {} cannot be executed by the embedded runtime",
            other
        )),
    }
}

fn validate_limits(config: &SandboxConfig, result: &mut ValidationResult) {
    if config.exec_timeout_ms == Some(0) {
        result.add_error("exec_timeout_ms cannot be zero (omit it to disable)".to_string());
    }

    if config.output_limit_bytes == 0 {
        result.add_error("output_limit_bytes cannot be zero".to_string());
    } else if config.output_limit_bytes > LARGE_OUTPUT_LIMIT {
        result.add_warning(format!(
            "output_limit_bytes {} is very large (> 64MB)",
            config.output_limit_bytes
        ));
    }

    if config.worker_stack_bytes < MIN_WORKER_STACK {
        result.add_error(format!(
            "worker_stack_bytes {} is below the 1MB minimum",
            config.worker_stack_bytes
        ));
    }
}

fn validate_paths(config: &SandboxConfig, result: &mut ValidationResult) {
    if !config.runtime_root.is_absolute() {
        result.add_error(format!(
            "runtime_root must be absolute path: {:?}",
            config.runtime_root
        ));
    }

    for path in &config.stdlib_paths {
        if !path.is_dir() {
            result.add_warning(format!("stdlib path does not exist: {:?}", path));
        }
    }
}
