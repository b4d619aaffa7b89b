//! Observability
//!
//! Process-wide metrics for operational visibility.

pub mod metrics;
