//! Execution control
//!
//! Runs learner programs on a mounted runtime with captured output.

pub mod session;

pub use session::ExecutionSession;
