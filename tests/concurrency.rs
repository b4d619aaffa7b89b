//! Concurrency tests: single-flight acquisition and serialized sessions

use pybox::runtime::RuntimeProvider;
use pybox::{ExecutionSession, SandboxConfig};
use std::sync::{Arc, Barrier};
use std::thread;

fn shared_provider() -> (tempfile::TempDir, Arc<RuntimeProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
        runtime_root: dir.path().to_path_buf(),
        ..Default::default()
    };
    (dir, Arc::new(RuntimeProvider::new(config)))
}

#[test]
fn test_concurrent_acquire_bootstraps_once() {
    let (_dir, provider) = shared_provider();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                provider.acquire().unwrap()
            })
        })
        .collect();

    let runtimes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(provider.bootstrap_count(), 1);
    for runtime in &runtimes[1..] {
        assert!(Arc::ptr_eq(&runtimes[0], runtime));
    }
}

#[test]
fn test_concurrent_runs_never_interleave() {
    let (_dir, provider) = shared_provider();
    let runtime = provider.acquire().unwrap();
    let threads = 4;
    let lines = 40;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|n| {
            let runtime = Arc::clone(&runtime);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let source = format!(
                    "for i in range({lines}):\n    print('worker{n}-' + str(i))\n",
                    lines = lines,
                    n = n
                );
                barrier.wait();
                ExecutionSession::new(&runtime).run(&source).unwrap()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert!(result.success);
        let expected: String = (0..lines).map(|i| format!("worker{}-{}\n", n, i)).collect();
        assert_eq!(result.output, expected);
    }
}
