/// Runtime handle: one interpreter worker thread plus its private project root
use crate::config::config::SandboxConfig;
use crate::config::types::{Result, SandboxError};
use crate::runtime::interpreter::{interrupt_signal, Engine};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use rustpython_vm::signal::{user_signal_channel, UserSignalSender};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

type Job = Box<dyn FnOnce(&Engine) + Send>;

/// Interrupts sent to an overrunning job before it is given up on
const INTERRUPT_ATTEMPTS: u32 = 40;
/// Wait for the job to unwind after each interrupt
const INTERRUPT_GRACE: Duration = Duration::from_millis(50);

/// State owned by whoever holds the session lease
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Bare file names written by earlier mounts
    pub(crate) mounted: BTreeSet<String>,
    /// Project root already on `sys.path`
    pub(crate) path_registered: bool,
}

/// Exclusive right to mount into and execute on a runtime.
///
/// Redirect, execute and restore all happen while one lease is held, so
/// concurrent callers never see each other's output.
pub struct SessionLease<'a> {
    handle: &'a RuntimeHandle,
    state: MutexGuard<'a, SessionState>,
}

impl<'a> SessionLease<'a> {
    pub fn handle(&self) -> &'a RuntimeHandle {
        self.handle
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }
}

/// A live embedded interpreter.
///
/// The interpreter itself is not `Send`, so it lives on a dedicated worker
/// thread and receives work as closures. Dropping the last handle closes the
/// job queue, which stops the worker, and removes the project root.
pub struct RuntimeHandle {
    id: String,
    created_at: DateTime<Utc>,
    base_dir: PathBuf,
    project_root: PathBuf,
    config: SandboxConfig,
    jobs: Sender<Job>,
    interrupts: Mutex<UserSignalSender>,
    session: Mutex<SessionState>,
    poisoned: AtomicBool,
}

impl RuntimeHandle {
    /// Create the project root and start a worker with a ready interpreter.
    pub fn spawn(config: &SandboxConfig) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let base_dir = config.runtime_root.join(&id);
        let project_root = base_dir.join("project");

        fs::create_dir_all(&project_root).map_err(|e| {
            SandboxError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create project root {}: {}",
                    project_root.display(),
                    e
                ),
            ))
        })?;

        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (interrupts, interrupt_rx) = user_signal_channel();
        let stdlib_paths = config.stdlib_paths.clone();
        let root = project_root.display().to_string();

        let spawned = thread::Builder::new()
            .name(format!("pybox-{}", &id[..8]))
            .stack_size(config.worker_stack_bytes)
            .spawn(move || {
                let engine = Engine::bootstrap(&stdlib_paths, root, interrupt_rx);
                let probe = engine.probe();
                let healthy = probe.is_ok();
                let _ = ready_tx.send(probe);
                if !healthy {
                    return;
                }
                for job in jobs_rx {
                    job(&engine);
                }
                debug!("runtime worker exiting");
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                remove_dir(&base_dir);
                return Err(SandboxError::Bootstrap(format!(
                    "Failed to spawn interpreter thread: {}",
                    e
                )));
            }
        };

        let failure = match ready_rx.recv() {
            Ok(Ok(())) => None,
            Ok(Err(msg)) => Some(format!("interpreter self-check failed: {}", msg)),
            Err(_) => Some("interpreter worker exited during bootstrap".to_string()),
        };
        if let Some(msg) = failure {
            let _ = worker.join();
            remove_dir(&base_dir);
            return Err(SandboxError::Bootstrap(msg));
        }

        info!(
            "runtime {} ready, project root {}",
            id,
            project_root.display()
        );

        Ok(Self {
            id,
            created_at: Utc::now(),
            base_dir,
            project_root,
            config: config.clone(),
            jobs: jobs_tx,
            interrupts: Mutex::new(interrupts),
            session: Mutex::new(SessionState::default()),
            poisoned: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// False once the worker died or a run overran its budget
    pub fn is_usable(&self) -> bool {
        !self.poisoned.load(Ordering::Acquire)
    }

    fn poison(&self, reason: &str) {
        if !self.poisoned.swap(true, Ordering::AcqRel) {
            warn!("runtime {} marked unusable: {}", self.id, reason);
        }
    }

    /// Wait for exclusive use of the runtime
    pub fn lease(&self) -> Result<SessionLease<'_>> {
        // The guarded state stays consistent even if a holder panicked.
        let state = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.is_usable() {
            return Err(SandboxError::RuntimeUnavailable(format!(
                "runtime {} is no longer usable",
                self.id
            )));
        }
        Ok(SessionLease {
            handle: self,
            state,
        })
    }

    /// Run `f` on the worker thread and wait for its result.
    ///
    /// With a budget, a job that overruns it poisons the handle and is
    /// interrupted; the worker then idles until the handle is dropped.
    pub(crate) fn call<R, F>(&self, budget: Option<Duration>, f: F) -> Result<R>
    where
        F: FnOnce(&Engine) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move |engine| {
            let _ = reply_tx.send(f(engine));
        });

        if self.jobs.send(job).is_err() {
            self.poison("worker stopped");
            return Err(SandboxError::RuntimeUnavailable(
                "interpreter worker stopped".to_string(),
            ));
        }

        match budget {
            Some(budget) => match reply_rx.recv_timeout(budget) {
                Ok(value) => Ok(value),
                Err(RecvTimeoutError::Timeout) => {
                    self.poison("execution budget exceeded");
                    self.interrupt(&reply_rx);
                    Err(SandboxError::timed_out(budget))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.poison("worker dropped a job");
                    Err(SandboxError::RuntimeUnavailable(
                        "interpreter worker crashed".to_string(),
                    ))
                }
            },
            None => reply_rx.recv().map_err(|_| {
                self.poison("worker dropped a job");
                SandboxError::RuntimeUnavailable("interpreter worker crashed".to_string())
            }),
        }
    }
}

impl RuntimeHandle {
    /// Raise `KeyboardInterrupt` in the running job until it returns.
    ///
    /// The interpreter only polls signals between instructions, and code
    /// that catches the first interrupt gets another one.
    fn interrupt<R>(&self, reply: &Receiver<R>) {
        for _ in 0..INTERRUPT_ATTEMPTS {
            let sent = self
                .interrupts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .send(interrupt_signal());
            if sent.is_err() {
                // Receiver gone: the interpreter has been torn down
                return;
            }
            match reply.recv_timeout(INTERRUPT_GRACE) {
                Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("runtime {} job interrupted", self.id);
                    return;
                }
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
        warn!(
            "runtime {} job ignored {} interrupts; abandoning worker",
            self.id, INTERRUPT_ATTEMPTS
        );
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("project_root", &self.project_root)
            .field("usable", &self.is_usable())
            .finish()
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        debug!("dropping runtime {}", self.id);
        remove_dir(&self.base_dir);
    }
}

fn remove_dir(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!("Failed to remove runtime directory {}: {}", dir.display(), e);
        }
    }
}
