//! Watch mode
//!
//! Watches the resolved inputs, every dependency recorded in the graph, and
//! the discovered config files; recomputes the minimal recompile set per
//! change and re-runs the batch until the process is terminated. With:
//! - Debouncing (100ms)
//! - Content-hash filtering of no-op change events
//! - Optional polling backend (`--poll`)
//! - Graceful Ctrl+C shutdown

mod event;
mod run;
#[cfg(test)]
mod tests;

pub use event::{WatchEvent, WatcherState};
pub use run::watch;
