// Latency benchmark for the embedded runtime
// Cold start: provider creation to a ready interpreter
// Warm runs: mount + execute on an already bootstrapped runtime

use pybox::runtime::RuntimeProvider;
use pybox::{ExecutionSession, FileSystemState, MissionFile, SandboxConfig, TestHarness};
use std::time::{Duration, Instant};

const COLD_ITERATIONS: usize = 10;
const ITERATIONS: usize = 100;
const WARMUP_ITERATIONS: usize = 10;

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = ((len as f64 * 0.95) as usize).min(len - 1);
        let p99_idx = ((len as f64 * 0.99) as usize).min(len - 1);

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n{}", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

/// Benchmark result
struct BenchmarkResult {
    scenario: String,
    stats: LatencyStats,
    passed: bool,
    reason: Option<String>,
}

impl BenchmarkResult {
    fn new(scenario: &str, samples: Vec<Duration>, p50_budget: Duration) -> Self {
        let stats = LatencyStats::from_samples(samples);
        let passed = stats.p50 < p50_budget;
        let reason = (!passed).then(|| format!("p50={:?} (target <{:?})", stats.p50, p50_budget));
        Self {
            scenario: scenario.to_string(),
            stats,
            passed,
            reason,
        }
    }

    fn print(&self) {
        println!("\n=== {} ===", self.scenario);
        self.stats.print("Latency");

        match &self.reason {
            None => println!("✅ PASS"),
            Some(reason) => println!("❌ FAIL: {}", reason),
        }
    }
}

fn config(root: &std::path::Path) -> SandboxConfig {
    SandboxConfig {
        runtime_root: root.to_path_buf(),
        ..Default::default()
    }
}

fn project() -> FileSystemState {
    FileSystemState::from_mission(&[
        MissionFile::entry("main.py", "from calc import add\nprint(add(2, 3))\n"),
        MissionFile::new("calc.py", "def add(a, b):\n    return a + b\n"),
    ])
}

/// Fresh provider each iteration: spawn worker, build interpreter, self-check
fn benchmark_cold_start(root: &std::path::Path) -> BenchmarkResult {
    let mut samples = Vec::new();
    for _ in 0..COLD_ITERATIONS {
        let provider = RuntimeProvider::new(config(root));
        let start = Instant::now();
        let runtime = provider.acquire().expect("bootstrap");
        samples.push(start.elapsed());
        drop(runtime);
    }
    BenchmarkResult::new("Cold start", samples, Duration::from_secs(2))
}

fn benchmark_entry_run(provider: &RuntimeProvider) -> BenchmarkResult {
    let runtime = provider.acquire().expect("bootstrap");
    let session = ExecutionSession::new(&runtime);
    let state = project();

    for _ in 0..WARMUP_ITERATIONS {
        let _ = session.run_entry(&state);
    }

    let mut samples = Vec::new();
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        let result = session.run_entry(&state).expect("run");
        samples.push(start.elapsed());
        assert!(result.success);
    }
    BenchmarkResult::new("Warm entry run", samples, Duration::from_millis(50))
}

fn benchmark_test_run(provider: &RuntimeProvider) -> BenchmarkResult {
    let runtime = provider.acquire().expect("bootstrap");
    let harness = TestHarness::new(&runtime);
    let state = project();
    let tests = "from calc import add\n\ndef test_add():\n    assert add(2, 2) == 4\n\ndef test_neg():\n    assert add(-1, 1) == 0\n";

    for _ in 0..WARMUP_ITERATIONS {
        let _ = harness.run_tests(&state, tests);
    }

    let mut samples = Vec::new();
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        let result = harness.run_tests(&state, tests).expect("tests");
        samples.push(start.elapsed());
        assert!(result.run.success);
    }
    BenchmarkResult::new("Warm test run", samples, Duration::from_millis(100))
}

fn main() {
    println!("=== pybox Runtime Latency Benchmark ===");
    println!(
        "Iterations: {} cold, {} warm (after {} warmup)",
        COLD_ITERATIONS, ITERATIONS, WARMUP_ITERATIONS
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let provider = RuntimeProvider::new(config(dir.path()));

    let results = vec![
        benchmark_cold_start(dir.path()),
        benchmark_entry_run(&provider),
        benchmark_test_run(&provider),
    ];

    for result in &results {
        result.print();
    }

    let passed_count = results.iter().filter(|r| r.passed).count();
    let total_count = results.len();

    println!("\n=== Summary ===");
    println!("{}/{} scenarios passed", passed_count, total_count);

    if passed_count == total_count {
        println!("✅ All latency budgets met");
        std::process::exit(0);
    } else {
        println!("❌ Some latency budgets exceeded");
        std::process::exit(1);
    }
}
