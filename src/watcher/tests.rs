use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use tempfile::tempdir;

use super::event::{WatcherState, DEBOUNCE_MS};
use super::run::{add_watch_target, compute_recompile_set, content_hash, create_watcher};
use crate::dep_graph::DepGraph;
use crate::processor::InputId;

fn inputs(paths: &[&str]) -> Vec<InputId> {
    paths
        .iter()
        .map(|p| InputId::Path(PathBuf::from(p)))
        .collect()
}

#[test]
fn test_changed_input_recompiles_only_itself() {
    let graph = DepGraph::new();
    let set = compute_recompile_set(
        &[PathBuf::from("/src/a.css")],
        &inputs(&["/src/a.css", "/src/b.css"]),
        &graph,
    );
    assert_eq!(set, inputs(&["/src/a.css"]));
}

#[test]
fn test_changed_dependency_recompiles_its_dependents() {
    let graph = DepGraph::new();
    graph.add(Path::new("/src/main.css"), Path::new("/src/partial.css"));

    let set = compute_recompile_set(
        &[PathBuf::from("/src/partial.css")],
        &inputs(&["/src/main.css", "/src/other.css"]),
        &graph,
    );
    // main depends on the partial; other is untouched
    assert_eq!(set, inputs(&["/src/main.css"]));
}

#[test]
fn test_dependents_outside_the_input_set_are_ignored() {
    let graph = DepGraph::new();
    graph.add(Path::new("/elsewhere/x.css"), Path::new("/src/partial.css"));
    graph.add(Path::new("/src/main.css"), Path::new("/src/partial.css"));

    let set = compute_recompile_set(
        &[PathBuf::from("/src/partial.css")],
        &inputs(&["/src/main.css"]),
        &graph,
    );
    assert_eq!(set, inputs(&["/src/main.css"]));
}

#[test]
fn test_unrelated_change_falls_back_to_all_inputs() {
    let graph = DepGraph::new();
    let all = inputs(&["/src/a.css", "/src/b.css"]);

    // e.g. the config file changed; nothing maps to an input
    let set = compute_recompile_set(&[PathBuf::from("/src/.refractrc.toml")], &all, &graph);
    assert_eq!(set, all);
}

#[test]
fn test_recompile_set_preserves_input_resolution_order() {
    let graph = DepGraph::new();
    graph.add(Path::new("/src/z.css"), Path::new("/src/shared.css"));
    graph.add(Path::new("/src/a.css"), Path::new("/src/shared.css"));

    let set = compute_recompile_set(
        &[PathBuf::from("/src/shared.css")],
        &inputs(&["/src/z.css", "/src/m.css", "/src/a.css"]),
        &graph,
    );
    // ordered as resolved, not as discovered in the graph
    assert_eq!(set, inputs(&["/src/z.css", "/src/a.css"]));
}

#[test]
fn test_watcher_state_debounces() {
    let mut state = WatcherState::new();
    assert!(!state.should_rebuild());

    state.add_change(PathBuf::from("a.css"));
    assert!(!state.should_rebuild());

    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
    assert!(state.should_rebuild());

    let changes = state.take_changes();
    assert_eq!(changes.len(), 1);
    assert!(!state.should_rebuild());
}

#[test]
fn test_watcher_state_coalesces_duplicate_changes() {
    let mut state = WatcherState::new();
    state.add_change(PathBuf::from("a.css"));
    state.add_change(PathBuf::from("a.css"));
    state.add_change(PathBuf::from("a.css"));

    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
    assert_eq!(state.take_changes().len(), 1);
}

#[test]
fn test_content_hash_distinguishes_content() {
    assert_eq!(content_hash("a { }"), content_hash("a { }"));
    assert_ne!(content_hash("a { }"), content_hash("b { }"));
}

#[test]
fn test_newly_registered_target_seeds_its_content_hash() {
    let dir = tempdir().unwrap();
    let late = dir.path().join("late.css");
    fs::write(&late, "l { }\n").unwrap();

    let (tx, _rx) = channel();
    let mut watcher = create_watcher(Some(50), tx).unwrap();
    let mut watched = HashSet::new();
    let mut watched_dirs = HashSet::new();
    let mut hashes = HashMap::new();

    add_watch_target(&mut watcher, &mut watched, &mut watched_dirs, &late, &mut hashes);

    // a dependency discovered mid-watch starts from its current bytes, so
    // the next no-op event on it is filtered like any seeded path
    let canonical = fs::canonicalize(&late).unwrap();
    assert!(watched.contains(&canonical));
    assert_eq!(hashes.get(&canonical), Some(&content_hash("l { }\n")));

    // re-registering must not clobber the recorded baseline
    hashes.insert(canonical.clone(), content_hash("old bytes"));
    add_watch_target(&mut watcher, &mut watched, &mut watched_dirs, &late, &mut hashes);
    assert_eq!(hashes.get(&canonical), Some(&content_hash("old bytes")));
}
