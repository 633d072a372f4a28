//! Property tests for refract.
//!
//! Properties use randomized input generation to protect invariants like
//! "duplicate adds never grow the graph" and "planning never panics".
//!
//! Run with: `cargo test --test properties`

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use refract::dep_graph::DepGraph;
use refract::output::{self, OutputMode};
use refract::processor::InputId;

fn path_segment() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9._-]{1,12}").unwrap()
}

fn abs_path() -> impl Strategy<Value = PathBuf> {
    proptest::collection::vec(path_segment(), 1..=4).prop_map(|segments| {
        let mut path = PathBuf::from("/");
        for segment in segments {
            path.push(segment);
        }
        path
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: adding the same (processed, dependency) pair repeatedly
    /// never grows the graph beyond the distinct pair count.
    #[test]
    fn property_duplicate_adds_do_not_grow_graph(
        pairs in proptest::collection::vec((abs_path(), abs_path()), 1..32),
        repeats in 1usize..4,
    ) {
        let graph = DepGraph::new();
        for _ in 0..repeats {
            for (processed, dependency) in &pairs {
                graph.add(processed, dependency);
            }
        }

        let mut distinct = pairs.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(graph.pair_count(), distinct.len());
    }

    /// PROPERTY: every recorded dependency shows up in `sources`, and each
    /// of its dependents is reachable through `dependents_of`.
    #[test]
    fn property_graph_projections_agree(
        pairs in proptest::collection::vec((abs_path(), abs_path()), 1..16),
    ) {
        let graph = DepGraph::new();
        for (processed, dependency) in &pairs {
            graph.add(processed, dependency);
        }

        let sources = graph.sources();
        for (processed, dependency) in &pairs {
            prop_assert!(sources.contains(dependency));
            prop_assert!(graph.dependents_of(dependency).contains(processed));
        }
    }

    /// PROPERTY: output planning never panics for any mode and any
    /// well-formed absolute input path.
    #[test]
    fn property_planning_never_panics(
        input in abs_path(),
        dest in abs_path(),
        ext in proptest::option::of(path_segment()),
    ) {
        let input = InputId::Path(input);
        let modes = [
            OutputMode::Stdout,
            OutputMode::Replace,
            OutputMode::Single { dest: dest.clone() },
            OutputMode::Dir { dir: dest.clone() },
            OutputMode::Aggregate { dest },
        ];
        for mode in modes {
            let _ = output::plan(&mode, &input, None, ext.as_deref());
        }
    }

    /// PROPERTY: the map sibling always gains a `.map` suffix.
    #[test]
    fn property_map_sibling_appends_map(dest in abs_path()) {
        let sibling = output::map_sibling(&dest);
        let name = sibling.file_name().unwrap().to_string_lossy().into_owned();
        prop_assert!(name.ends_with(".map"));
    }

}

#[test]
fn stdin_has_no_path() {
    assert!(InputId::Stdin.as_path().is_none());
    assert_eq!(InputId::Stdin.label(), "stdin");
}

#[test]
fn dependents_are_ordered_by_discovery() {
    let graph = DepGraph::new();
    graph.add(Path::new("/b.css"), Path::new("/dep.css"));
    graph.add(Path::new("/a.css"), Path::new("/dep.css"));
    assert_eq!(
        graph.dependents_of(Path::new("/dep.css")),
        vec![PathBuf::from("/b.css"), PathBuf::from("/a.css")]
    );
}
