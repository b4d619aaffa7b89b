//! pybox: an in-process Python execution engine for learning environments
//! Runs a learner's multi-file project and hidden tests inside an embedded interpreter
//!
//! # Architecture
//!
//! ## Virtual Filesystem ([`vfs`])
//! - [`vfs::state`]: Immutable project model with editor tabs
//! - [`vfs::language`]: Extension to language inference
//! - [`vfs::mission`]: Mission descriptors and persisted snapshots
//!
//! ## Runtime ([`runtime`])
//! - [`runtime::provider`]: Single-flight runtime acquisition and reset
//! - [`runtime::handle`]: Interpreter worker thread and session lease
//! - [`runtime::mount`]: Flat project mounting onto the import path
//! - [`runtime::interpreter`]: Interpreter bootstrap, stdout redirect, execution
//!
//! ## Execution Control ([`exec`])
//! - [`exec::session`]: Serialized runs with captured output
//!
//! ## Judge ([`judge`])
//! - [`judge::harness`]: Hidden test runs
//! - [`judge::driver`]: Generated test driver
//! - [`judge::report`]: Driver report decoding
//!
//! ## Observability ([`observability`])
//! - [`observability::metrics`]: Prometheus metrics export
//!
//! ## Configuration ([`config`])
//! - [`config::config`]: Configuration loading
//! - [`config::validator`]: Startup validation
//! - [`config::types`]: Shared result types, closed enums, errors
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output collection
//! - [`utils::py_literal`]: Python string literal rendering
//!
//! # Design Principles
//!
//! 1. **Values in, values out** - The project model is never mutated by execution
//! 2. **One interpreter** - Bootstrapped once, shared, serialized by a lease
//! 3. **Failures are results** - Learner errors never surface as `Err`

// Project model
pub mod vfs;

// Embedded interpreter
pub mod runtime;

// Execution Control
pub mod exec;

// Hidden tests
pub mod judge;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// Embedding facade
pub mod sandbox;

// CLI entrypoint for the pybox binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use config::SandboxConfig;
pub use exec::ExecutionSession;
pub use judge::TestHarness;
pub use runtime::{ProjectMounter, RuntimeHandle, RuntimeProvider};
pub use sandbox::Sandbox;
pub use vfs::{FileSystemState, Language, MissionDescriptor, MissionFile, VirtualFile};
