//! Watch loop events and debounce state

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::RefractError;

/// Debounce duration in milliseconds
pub(crate) const DEBOUNCE_MS: u64 = 100;

/// Lifecycle events surfaced to the caller's callback.
#[derive(Debug)]
pub enum WatchEvent {
    /// Idle, waiting for filesystem events
    Ready,
    /// A watched path changed (post-debounce, content actually differs)
    Changed { path: PathBuf },
    /// A rebuild batch is starting for this many files
    RebuildStarted { files: usize },
    /// The rebuild batch finished cleanly
    RebuildSucceeded,
    /// The rebuild batch failed; the watcher stays alive for syntax errors
    BuildFailed { error: RefractError },
}

/// Debounce state: coalesces bursts of change events into one rebuild.
pub struct WatcherState {
    pending_changes: HashSet<PathBuf>,
    last_change: Option<Instant>,
}

impl WatcherState {
    pub fn new() -> Self {
        Self {
            pending_changes: HashSet::new(),
            last_change: None,
        }
    }

    pub fn add_change(&mut self, path: PathBuf) {
        self.pending_changes.insert(path);
        self.last_change = Some(Instant::now());
    }

    pub fn should_rebuild(&self) -> bool {
        match self.last_change {
            Some(last) => {
                !self.pending_changes.is_empty()
                    && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
            }
            None => false,
        }
    }

    pub fn take_changes(&mut self) -> Vec<PathBuf> {
        let changes: Vec<_> = self.pending_changes.drain().collect();
        self.last_change = None;
        changes
    }
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::new()
    }
}
