//! Single-flight runtime acquisition.
//!
//! The first caller bootstraps the runtime outside the lock; everyone who
//! arrives meanwhile blocks on a condition variable and receives the same
//! instance. A failed attempt is reported to all of its waiters, and the
//! next call starts a fresh one.

use crate::config::config::SandboxConfig;
use crate::config::types::{Result, SandboxError};
use crate::observability::metrics::get_metrics;
use crate::runtime::handle::RuntimeHandle;
use log::{error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

/// A cached value that can go stale
pub trait Reusable {
    fn is_usable(&self) -> bool;
}

impl Reusable for RuntimeHandle {
    fn is_usable(&self) -> bool {
        RuntimeHandle::is_usable(self)
    }
}

enum Slot<T> {
    Empty,
    Initializing,
    Ready(Arc<T>),
}

struct CellState<T> {
    slot: Slot<T>,
    /// Id of the most recent initialization attempt
    attempt: u64,
    /// Attempt id and message of the last failure
    failure: Option<(u64, String)>,
    initializations: u64,
}

enum Next<T> {
    Hit(Arc<T>),
    Stale,
    Wait,
    Build,
}

/// Lazily initialized shared value with at most one initialization in flight
pub struct SingleFlight<T> {
    state: Mutex<CellState<T>>,
    ready: Condvar,
}

impl<T: Reusable> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState {
                slot: Slot::Empty,
                attempt: 0,
                failure: None,
                initializations: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Return the live value, initializing it with `init` if needed
    pub fn get_or_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut state = self.lock();
        loop {
            let next = match &state.slot {
                Slot::Ready(value) if value.is_usable() => Next::Hit(Arc::clone(value)),
                Slot::Ready(_) => Next::Stale,
                Slot::Initializing => Next::Wait,
                Slot::Empty => Next::Build,
            };

            match next {
                Next::Hit(value) => return Ok(value),
                Next::Stale => {
                    warn!("cached runtime is unusable, rebuilding");
                    state.slot = Slot::Empty;
                }
                Next::Wait => {
                    let awaited = state.attempt;
                    state = self
                        .ready
                        .wait_while(state, |s| matches!(s.slot, Slot::Initializing))
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    if let Some((failed, msg)) = &state.failure {
                        if *failed == awaited {
                            return Err(SandboxError::RuntimeUnavailable(msg.clone()));
                        }
                    }
                }
                Next::Build => {
                    state.slot = Slot::Initializing;
                    state.attempt += 1;
                    let attempt = state.attempt;
                    drop(state);
                    return self.initialize(attempt, init);
                }
            }
        }
    }

    fn initialize<F>(&self, attempt: u64, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(init)) {
            Ok(outcome) => outcome,
            Err(_) => Err(SandboxError::Bootstrap(
                "runtime initialization panicked".to_string(),
            )),
        };

        let mut state = self.lock();
        state.initializations += 1;
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                state.slot = Slot::Ready(Arc::clone(&value));
                state.failure = None;
                Ok(value)
            }
            Err(e) => {
                let msg = e.to_string();
                error!("runtime initialization attempt {} failed: {}", attempt, msg);
                state.slot = Slot::Empty;
                state.failure = Some((attempt, msg.clone()));
                Err(SandboxError::RuntimeUnavailable(msg))
            }
        };
        drop(state);
        self.ready.notify_all();
        result
    }

    /// Drop the cached value. An initialization in flight is left alone.
    pub fn reset(&self) -> bool {
        let mut state = self.lock();
        match state.slot {
            Slot::Ready(_) => {
                state.slot = Slot::Empty;
                true
            }
            Slot::Initializing => {
                warn!("reset requested while runtime initialization is in flight");
                false
            }
            Slot::Empty => false,
        }
    }

    pub fn current(&self) -> Option<Arc<T>> {
        match &self.lock().slot {
            Slot::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Completed initialization attempts, successful or not
    pub fn initializations(&self) -> u64 {
        self.lock().initializations
    }

    fn lock(&self) -> MutexGuard<'_, CellState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Reusable> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of the shared runtime for one host
pub struct RuntimeProvider {
    config: SandboxConfig,
    cell: SingleFlight<RuntimeHandle>,
}

impl RuntimeProvider {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            cell: SingleFlight::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Live runtime, bootstrapping one if none exists or the cached one is unusable
    pub fn acquire(&self) -> Result<Arc<RuntimeHandle>> {
        self.cell.get_or_init(|| {
            let metrics = get_metrics();
            let started = Instant::now();
            let handle = RuntimeHandle::spawn(&self.config);
            metrics.cold_start_latency.observe(started.elapsed());
            match &handle {
                Ok(h) => {
                    metrics.runtime_bootstraps.inc();
                    info!("runtime {} bootstrapped in {:?}", h.id(), started.elapsed());
                }
                Err(_) => metrics.runtime_bootstrap_failures.inc(),
            }
            handle
        })
    }

    /// Discard the live runtime; the next acquire builds a new one
    pub fn reset(&self) -> bool {
        let discarded = self.cell.reset();
        if discarded {
            get_metrics().runtime_resets.inc();
            info!("runtime discarded");
        }
        discarded
    }

    pub fn current(&self) -> Option<Arc<RuntimeHandle>> {
        self.cell.current()
    }

    pub fn bootstrap_count(&self) -> u64 {
        self.cell.initializations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct Probe {
        id: usize,
        usable: AtomicBool,
    }

    impl Reusable for Probe {
        fn is_usable(&self) -> bool {
            self.usable.load(Ordering::SeqCst)
        }
    }

    fn probe(id: usize) -> Probe {
        Probe {
            id,
            usable: AtomicBool::new(true),
        }
    }

    #[test]
    fn test_concurrent_callers_share_one_initialization() {
        let cell = Arc::new(SingleFlight::<Probe>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cell.get_or_init(|| {
                        let id = calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(probe(id))
                    })
                    .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<Probe>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.initializations(), 1);
        for value in &values[1..] {
            assert!(Arc::ptr_eq(&values[0], value));
        }
    }

    #[test]
    fn test_failure_reaches_waiters_and_next_call_retries() {
        let cell = Arc::new(SingleFlight::<Probe>::new());
        let started = Arc::new(Barrier::new(2));

        let initiator = {
            let cell = Arc::clone(&cell);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                cell.get_or_init(|| {
                    started.wait();
                    thread::sleep(Duration::from_millis(100));
                    Err(SandboxError::Bootstrap("no interpreter".to_string()))
                })
                .map(|p| p.id)
            })
        };

        started.wait();
        let waited = cell.get_or_init(|| Ok(probe(99)));
        let first = initiator.join().unwrap();

        assert!(matches!(first, Err(SandboxError::RuntimeUnavailable(_))));
        match waited {
            Err(SandboxError::RuntimeUnavailable(msg)) => assert!(msg.contains("no interpreter")),
            other => panic!("waiter should see the failure, got {:?}", other.map(|p| p.id)),
        }

        let retried = cell.get_or_init(|| Ok(probe(7))).unwrap();
        assert_eq!(retried.id, 7);
        assert_eq!(cell.initializations(), 2);
    }

    #[test]
    fn test_unusable_value_is_rebuilt() {
        let cell = SingleFlight::<Probe>::new();
        let first = cell.get_or_init(|| Ok(probe(1))).unwrap();
        first.usable.store(false, Ordering::SeqCst);

        let second = cell.get_or_init(|| Ok(probe(2))).unwrap();
        assert_eq!(second.id, 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reset_forces_fresh_initialization() {
        let cell = SingleFlight::<Probe>::new();
        assert!(!cell.reset());
        let first = cell.get_or_init(|| Ok(probe(1))).unwrap();
        assert!(cell.reset());
        assert!(cell.current().is_none());

        let second = cell.get_or_init(|| Ok(probe(2))).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.id, 1);
    }

    #[test]
    fn test_panicking_initializer_does_not_wedge_the_cell() {
        let cell = SingleFlight::<Probe>::new();
        let err = cell
            .get_or_init(|| -> Result<Probe> { panic!("boom") })
            .map(|p| p.id)
            .unwrap_err();
        assert!(err.to_string().contains("panicked"));
        assert_eq!(cell.get_or_init(|| Ok(probe(3))).unwrap().id, 3);
    }
}
