//! Embedded interpreter runtime
//!
//! - [`provider`]: single-flight acquisition and reset
//! - [`handle`]: worker thread, project root, session lease
//! - [`mount`]: writing project files where the interpreter imports them
//! - [`interpreter`]: RustPython setup, output redirection, program execution

pub mod handle;
pub mod interpreter;
pub mod mount;
pub mod provider;

pub use handle::{RuntimeHandle, SessionLease};
pub use mount::{MountFailure, MountReport, ProjectMounter};
pub use provider::RuntimeProvider;

use crate::config::config::SandboxConfig;
use crate::config::types::{Result, SandboxError};
use crate::config::validator::validate_config;
use log::{info, warn};
use std::sync::{Arc, OnceLock};

static GLOBAL_PROVIDER: OnceLock<Arc<RuntimeProvider>> = OnceLock::new();

/// Install the process-wide provider with an explicit configuration
pub fn init_global(config: SandboxConfig) -> Result<()> {
    validate_config(&config)?;
    GLOBAL_PROVIDER
        .set(Arc::new(RuntimeProvider::new(config)))
        .map_err(|_| SandboxError::Config("Runtime provider already initialized".to_string()))?;
    info!("Global runtime provider initialized");
    Ok(())
}

/// Process-wide provider; falls back to `pybox.json` or defaults when not initialized
pub fn global() -> Arc<RuntimeProvider> {
    Arc::clone(GLOBAL_PROVIDER.get_or_init(|| {
        let config = SandboxConfig::load_default().unwrap_or_else(|e| {
            warn!("{}; using built-in defaults", e);
            SandboxConfig::default()
        });
        Arc::new(RuntimeProvider::new(config))
    }))
}

/// Acquire the process-wide runtime
pub fn acquire_runtime() -> Result<Arc<RuntimeHandle>> {
    global().acquire()
}

/// Discard the process-wide runtime
pub fn reset_runtime() -> bool {
    global().reset()
}
