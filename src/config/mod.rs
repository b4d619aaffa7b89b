//! Configuration
//!
//! Engine settings, loading, validation, and the shared type vocabulary.

pub mod config;
pub mod types;
pub mod validator;

pub use config::SandboxConfig;
