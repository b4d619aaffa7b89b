//! Judge: hidden test execution.
//!
//! A generated driver discovers test functions by prefix, runs them in
//! lexical order, and reports per-test outcomes back to the host.

pub mod driver;
pub mod harness;
pub mod report;

pub use harness::TestHarness;
