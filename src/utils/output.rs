/// Bounded output capture for interpreter runs
/// Every write lands in a shared buffer so output survives a failed or abandoned run.

use crate::config::types::OutputIntegrity;
use std::sync::{Arc, Mutex};

/// Default capture limit (bytes)
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Default)]
struct BufferState {
    text: String,
    integrity: OutputIntegrity,
}

/// Shared, size-limited text sink.
///
/// Clones share the same storage. Once the limit is reached further writes
/// are dropped and the buffer reports [`OutputIntegrity::TruncatedByLimit`].
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    limit: usize,
    state: Arc<Mutex<BufferState>>,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Arc::new(Mutex::new(BufferState::default())),
        }
    }

    /// Append text, truncating at a char boundary when the limit is hit.
    /// Returns the number of bytes kept.
    pub fn write_str(&self, data: &str) -> usize {
        let mut state = self.lock();
        if state.integrity == OutputIntegrity::TruncatedByLimit {
            return 0;
        }

        let remaining = self.limit.saturating_sub(state.text.len());
        if data.len() <= remaining {
            state.text.push_str(data);
            return data.len();
        }

        let mut cut = remaining;
        while !data.is_char_boundary(cut) {
            cut -= 1;
        }
        state.text.push_str(&data[..cut]);
        state.integrity = OutputIntegrity::TruncatedByLimit;
        cut
    }

    /// Copy of everything captured so far
    pub fn snapshot(&self) -> String {
        self.lock().text.clone()
    }

    pub fn integrity(&self) -> OutputIntegrity {
        self.lock().integrity
    }

    pub fn len(&self) -> usize {
        self.lock().text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock leaves plain text behind; keep serving it.
    fn lock(&self) -> std::sync::MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT)
    }
}
