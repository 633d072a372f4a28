//! In-memory dependency graph
//!
//! Records which source files are transitively required by which processed
//! files, as declared by dependency messages from the pipeline. The graph is
//! append-only: entries for since-deleted files are tolerated, they only add
//! harmless extra watch targets. Indexed by dependency path so the reverse
//! lookup used by the watch loop is O(dependents), not a full scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only dependency graph, safe for concurrent adds from parallel
/// file processing.
#[derive(Debug, Default)]
pub struct DepGraph {
    inner: Mutex<GraphInner>,
}

#[derive(Debug, Default)]
struct GraphInner {
    /// dependency source -> processed files that declared it, in discovery order
    dependents: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `processed` depends on `dependency`.
    ///
    /// Re-adding an existing pair is a no-op.
    pub fn add(&self, processed: &Path, dependency: &Path) {
        let mut inner = self.lock();
        let entry = inner
            .dependents
            .entry(dependency.to_path_buf())
            .or_default();
        if !entry.iter().any(|p| p == processed) {
            entry.push(processed.to_path_buf());
        }
    }

    /// Processed files that declared a dependency on `source`, in the order
    /// the dependency was first discovered.
    pub fn dependents_of(&self, source: &Path) -> Vec<PathBuf> {
        self.lock()
            .dependents
            .get(source)
            .cloned()
            .unwrap_or_default()
    }

    /// Every distinct dependency source ever recorded. Used to seed and
    /// extend the watch set.
    pub fn sources(&self) -> Vec<PathBuf> {
        self.lock().dependents.keys().cloned().collect()
    }

    /// Number of distinct (processed, dependency) pairs.
    pub fn pair_count(&self) -> usize {
        self.lock().dependents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().dependents.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GraphInner> {
        // A poisoned lock only means a processing thread panicked mid-add;
        // the map itself is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
