// Engine metrics
//
// Counters, gauges, and histograms for:
// - Run outcomes (OK, RE, CE, TLE, NOENTRY, IE)
// - Per-test outcomes
// - Runtime lifecycle (bootstraps, failures, resets, timeouts)
// - Mount activity
// - Bootstrap and execution latency

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::types::{ExecutionStatus, OutcomeKind};

/// Counter metric (monotonically increasing)
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge metric (can go up or down)
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturate at zero
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Histogram bucket for latency tracking
#[derive(Debug)]
pub struct HistogramBucket {
    pub le: f64, // upper bound in seconds
    pub count: AtomicU64,
}

/// Histogram metric for latency/duration tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<HistogramBucket>,
    sum: AtomicU64, // microseconds
    count: AtomicU64,
}

impl Histogram {
    /// Buckets from 1ms to 30s; interpreter bootstrap sits at the top end
    pub fn new_latency() -> Self {
        let bucket_bounds = [
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ];

        let buckets = bucket_bounds
            .into_iter()
            .map(|le| HistogramBucket {
                le,
                count: AtomicU64::new(0),
            })
            .collect();

        Self {
            buckets,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: Duration) {
        let seconds = value.as_secs_f64();
        self.sum
            .fetch_add(value.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for bucket in &self.buckets {
            if seconds <= bucket.le {
                bucket.count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum_micros(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn get_bucket_count(&self, le: f64) -> u64 {
        self.buckets
            .iter()
            .find(|b| (b.le - le).abs() < 0.0001)
            .map(|b| b.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn export(&self, name: &str, help: &str, output: &mut String) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} histogram\n", name));
        for bucket in &self.buckets {
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                name,
                bucket.le,
                bucket.count.load(Ordering::Relaxed)
            ));
        }
        output.push_str(&format!(
            "{}_bucket{{le=\"+Inf\"}} {}\n",
            name,
            self.get_count()
        ));
        output.push_str(&format!(
            "{}_sum {}\n",
            name,
            self.get_sum_micros() as f64 / 1_000_000.0
        ));
        output.push_str(&format!("{}_count {}\n", name, self.get_count()));
    }
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    // Run outcomes
    pub executions_total: Counter,
    pub executions_ok: Counter,
    pub executions_re: Counter,
    pub executions_ce: Counter,
    pub executions_tle: Counter,
    pub executions_noentry: Counter,
    pub executions_ie: Counter,

    // Test outcomes
    pub tests_passed: Counter,
    pub tests_failed: Counter,
    pub tests_errored: Counter,

    // Runtime lifecycle
    pub runtime_bootstraps: Counter,
    pub runtime_bootstrap_failures: Counter,
    pub runtime_resets: Counter,
    pub runtime_timeouts: Counter,

    // Mounting and capture
    pub mount_files_written: Counter,
    pub mount_files_failed: Counter,
    pub mount_files_removed: Counter,
    pub output_truncations: Counter,

    pub active_executions: Gauge,

    // Latency histograms
    pub cold_start_latency: Histogram,
    pub execution_duration: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            executions_total: Counter::new(),
            executions_ok: Counter::new(),
            executions_re: Counter::new(),
            executions_ce: Counter::new(),
            executions_tle: Counter::new(),
            executions_noentry: Counter::new(),
            executions_ie: Counter::new(),

            tests_passed: Counter::new(),
            tests_failed: Counter::new(),
            tests_errored: Counter::new(),

            runtime_bootstraps: Counter::new(),
            runtime_bootstrap_failures: Counter::new(),
            runtime_resets: Counter::new(),
            runtime_timeouts: Counter::new(),

            mount_files_written: Counter::new(),
            mount_files_failed: Counter::new(),
            mount_files_removed: Counter::new(),
            output_truncations: Counter::new(),

            active_executions: Gauge::new(),

            cold_start_latency: Histogram::new_latency(),
            execution_duration: Histogram::new_latency(),
        }
    }

    /// Record run outcome
    pub fn record_execution(&self, status: ExecutionStatus) {
        self.executions_total.inc();

        match status {
            ExecutionStatus::Ok => self.executions_ok.inc(),
            ExecutionStatus::RuntimeError => self.executions_re.inc(),
            ExecutionStatus::CompileError => self.executions_ce.inc(),
            ExecutionStatus::TimeLimit => self.executions_tle.inc(),
            ExecutionStatus::NoEntry => self.executions_noentry.inc(),
            ExecutionStatus::InternalError => self.executions_ie.inc(),
        }
    }

    pub fn record_test(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Passed => self.tests_passed.inc(),
            OutcomeKind::Failed => self.tests_failed.inc(),
            OutcomeKind::Errored => self.tests_errored.inc(),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP pybox_executions_total Total number of runs\n");
        output.push_str("# TYPE pybox_executions_total counter\n");
        output.push_str(&format!(
            "pybox_executions_total {}\n",
            self.executions_total.get()
        ));

        output.push_str("# HELP pybox_executions_by_status Runs by status\n");
        output.push_str("# TYPE pybox_executions_by_status counter\n");
        for (status, counter) in [
            (ExecutionStatus::Ok, &self.executions_ok),
            (ExecutionStatus::RuntimeError, &self.executions_re),
            (ExecutionStatus::CompileError, &self.executions_ce),
            (ExecutionStatus::TimeLimit, &self.executions_tle),
            (ExecutionStatus::NoEntry, &self.executions_noentry),
            (ExecutionStatus::InternalError, &self.executions_ie),
        ] {
            output.push_str(&format!(
                "pybox_executions_by_status{{status=\"{}\"}} {}\n",
                status,
                counter.get()
            ));
        }

        output.push_str("# HELP pybox_tests_total Test outcomes\n");
        output.push_str("# TYPE pybox_tests_total counter\n");
        for (outcome, counter) in [
            ("passed", &self.tests_passed),
            ("failed", &self.tests_failed),
            ("errored", &self.tests_errored),
        ] {
            output.push_str(&format!(
                "pybox_tests_total{{outcome=\"{}\"}} {}\n",
                outcome,
                counter.get()
            ));
        }

        output.push_str("# HELP pybox_runtime_events_total Runtime lifecycle events\n");
        output.push_str("# TYPE pybox_runtime_events_total counter\n");
        for (event, counter) in [
            ("bootstrap", &self.runtime_bootstraps),
            ("bootstrap_failure", &self.runtime_bootstrap_failures),
            ("reset", &self.runtime_resets),
            ("timeout", &self.runtime_timeouts),
        ] {
            output.push_str(&format!(
                "pybox_runtime_events_total{{event=\"{}\"}} {}\n",
                event,
                counter.get()
            ));
        }

        output.push_str("# HELP pybox_mount_files_total Files handled by mounts\n");
        output.push_str("# TYPE pybox_mount_files_total counter\n");
        for (result, counter) in [
            ("written", &self.mount_files_written),
            ("failed", &self.mount_files_failed),
            ("removed", &self.mount_files_removed),
        ] {
            output.push_str(&format!(
                "pybox_mount_files_total{{result=\"{}\"}} {}\n",
                result,
                counter.get()
            ));
        }

        output.push_str("# HELP pybox_output_truncations_total Runs whose output hit the limit\n");
        output.push_str("# TYPE pybox_output_truncations_total counter\n");
        output.push_str(&format!(
            "pybox_output_truncations_total {}\n",
            self.output_truncations.get()
        ));

        output.push_str("# HELP pybox_active_executions Currently active runs\n");
        output.push_str("# TYPE pybox_active_executions gauge\n");
        output.push_str(&format!(
            "pybox_active_executions {}\n",
            self.active_executions.get()
        ));

        self.cold_start_latency.export(
            "pybox_cold_start_latency_seconds",
            "Runtime bootstrap latency",
            &mut output,
        );
        self.execution_duration.export(
            "pybox_execution_duration_seconds",
            "Wall time per run",
            &mut output,
        );

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
static METRICS: once_cell::sync::Lazy<Arc<MetricsRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// Get global metrics registry
pub fn get_metrics() -> Arc<MetricsRegistry> {
    Arc::clone(&METRICS)
}
