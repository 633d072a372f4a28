//! The watch loop

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};

use crate::batch;
use crate::cli::{canonicalize_lenient, Session};
use crate::dep_graph::DepGraph;
use crate::error::{RefractError, RefractResult};
use crate::output;
use crate::pipeline::Registry;
use crate::processor::InputId;
use crate::ui::Ui;

use super::event::{WatchEvent, WatcherState};

/// Watch the session's inputs plus every known dependency and config file,
/// rebuilding the minimal set on each change until `running` goes false.
///
/// Syntax errors are reported through the callback and keep the loop alive;
/// any other batch failure propagates and tears the watcher down.
pub fn watch(
    session: &Session,
    registry: &Registry,
    graph: &DepGraph,
    config_paths: &[PathBuf],
    running: Arc<AtomicBool>,
    ui: &Ui,
    event_callback: impl Fn(WatchEvent),
) -> RefractResult<()> {
    let (tx, rx) = channel();
    let mut watcher = create_watcher(session.poll, tx)?;

    let mut watched: HashSet<PathBuf> = HashSet::new();
    let mut watched_dirs: HashSet<PathBuf> = HashSet::new();
    let mut hashes: HashMap<PathBuf, String> = HashMap::new();

    let input_paths: Vec<PathBuf> = session
        .inputs
        .iter()
        .filter_map(|input| input.as_path().map(Path::to_path_buf))
        .collect();
    for path in input_paths
        .iter()
        .chain(graph.sources().iter())
        .chain(config_paths.iter())
    {
        add_watch_target(&mut watcher, &mut watched, &mut watched_dirs, path, &mut hashes);
    }

    event_callback(WatchEvent::Ready);

    let mut state = WatcherState::new();
    while running.load(Ordering::SeqCst) {
        // Check for file changes (non-blocking with timeout)
        if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
            let path = canonicalize_lenient(&path);
            if watched.contains(&path) {
                // Filter out events that did not change the bytes
                if let Ok(content) = fs::read_to_string(&path) {
                    let new_hash = content_hash(&content);
                    if hashes.get(&path) == Some(&new_hash) {
                        continue;
                    }
                    hashes.insert(path.clone(), new_hash);
                }
                state.add_change(path);
            }
        }

        if state.should_rebuild() {
            let changes = state.take_changes();
            for change in &changes {
                event_callback(WatchEvent::Changed {
                    path: change.clone(),
                });
            }

            // Aggregate output makes partial recompilation unsafe: appends
            // would duplicate or misorder content. Truncate and rebuild all.
            let recompile = if session.mode.is_aggregate() {
                if let Some(dest) = session.mode.aggregate_dest() {
                    output::truncate_destination(dest)?;
                }
                session.inputs.clone()
            } else {
                compute_recompile_set(&changes, &session.inputs, graph)
            };

            event_callback(WatchEvent::RebuildStarted {
                files: recompile.len(),
            });
            let rebuilt = batch::run(&recompile, session, registry, graph, ui);

            // Extend the watch set with anything newly discovered; files
            // that processed cleanly register dependencies even when a
            // sibling failed. It only ever grows.
            for path in graph.sources() {
                add_watch_target(&mut watcher, &mut watched, &mut watched_dirs, &path, &mut hashes);
            }

            match rebuilt {
                Ok(outcome) => {
                    for path in outcome.config_paths() {
                        add_watch_target(
                            &mut watcher,
                            &mut watched,
                            &mut watched_dirs,
                            &path,
                            &mut hashes,
                        );
                    }
                    event_callback(WatchEvent::RebuildSucceeded);
                }
                Err(error) if error.is_syntax() => {
                    event_callback(WatchEvent::BuildFailed { error });
                }
                Err(error) => return Err(error),
            }
            event_callback(WatchEvent::Ready);
        }
    }

    Ok(())
}

/// Minimal recompile set for a burst of changes: each changed file that is
/// itself an input, plus every input that depends on a changed file. Result
/// is ordered by input-resolution order. Empty (config change, stale dep)
/// falls back to all inputs.
pub(crate) fn compute_recompile_set(
    changed: &[PathBuf],
    inputs: &[InputId],
    graph: &DepGraph,
) -> Vec<InputId> {
    let mut wanted: HashSet<PathBuf> = HashSet::new();
    for change in changed {
        wanted.insert(change.clone());
        for dependent in graph.dependents_of(change) {
            wanted.insert(dependent);
        }
    }

    let selected: Vec<InputId> = inputs
        .iter()
        .filter(|input| {
            input
                .as_path()
                .map(|path| wanted.contains(path))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        inputs.to_vec()
    } else {
        selected
    }
}

pub(crate) fn create_watcher(poll: Option<u64>, tx: Sender<PathBuf>) -> RefractResult<Box<dyn Watcher>> {
    let handler = move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
    };

    let watcher: Box<dyn Watcher> = match poll {
        Some(interval) => Box::new(
            PollWatcher::new(
                handler,
                Config::default().with_poll_interval(Duration::from_millis(interval.max(1))),
            )
            .map_err(notify_error)?,
        ),
        None => Box::new(RecommendedWatcher::new(handler, Config::default()).map_err(notify_error)?),
    };
    Ok(watcher)
}

/// Watch `path` by watching its parent directory (survives the
/// rename-replace dance editors do) and remembering the file itself for
/// event filtering. Registration failures for since-deleted paths are
/// ignored; stale graph entries are tolerated. New targets get their
/// content hash seeded so pre-existing bytes don't count as changes
/// (editors fire spurious events, notify sometimes reports on watch
/// registration).
pub(crate) fn add_watch_target(
    watcher: &mut Box<dyn Watcher>,
    watched: &mut HashSet<PathBuf>,
    watched_dirs: &mut HashSet<PathBuf>,
    path: &Path,
    hashes: &mut HashMap<PathBuf, String>,
) {
    let path = canonicalize_lenient(path);
    if let Some(parent) = path.parent() {
        if watched_dirs.insert(parent.to_path_buf()) {
            let _ = watcher.watch(parent, RecursiveMode::NonRecursive);
        }
    }
    if watched.insert(path.clone()) {
        if let Ok(content) = fs::read_to_string(&path) {
            hashes.insert(path, content_hash(&content));
        }
    }
}

pub(crate) fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn notify_error(e: notify::Error) -> RefractError {
    RefractError::Io(std::io::Error::other(e.to_string()))
}
