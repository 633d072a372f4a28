//! refract - pluggable text-transformation pipeline runner
//!
//! refract applies a named pipeline of text transforms to one or more
//! source files, writing results to stdout, to per-file destinations, or
//! appended into a single aggregate file, and can watch the filesystem to
//! rebuild the minimal set of files when inputs or their declared
//! dependencies change.

pub mod batch;
pub mod cli;
pub mod config;
pub mod dep_graph;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod ui;
pub mod watcher;

// Re-exports for convenience
pub use batch::{run as run_batch, BatchOutcome};
pub use cli::{Cli, Session};
pub use dep_graph::DepGraph;
pub use error::{RefractError, RefractResult};
pub use output::{OutputMode, OutputPlan};
pub use pipeline::{default_registry, Diagnostic, MapMode, Message, Registry, SyntaxError};
pub use processor::{process_file, InputId, Processed};
pub use ui::Ui;
pub use watcher::{watch, WatchEvent};
