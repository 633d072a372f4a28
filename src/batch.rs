//! Batch runner
//!
//! Fans a list of inputs out across the rayon pool. Pipeline runs complete
//! in any order; reporting and writing then happen strictly in
//! input-resolution order, which makes aggregate-mode concatenation
//! deterministic. Used for the initial full build and for every
//! watch-triggered rebuild.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::cli::Session;
use crate::dep_graph::DepGraph;
use crate::error::RefractResult;
use crate::pipeline::Registry;
use crate::processor::{self, InputId, Processed};
use crate::ui::Ui;

/// Results of one batch, in input-resolution order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub files: Vec<Processed>,
}

impl BatchOutcome {
    /// Dependency sources discovered by this batch, deduplicated.
    pub fn dependency_sources(&self) -> Vec<PathBuf> {
        let mut sources = Vec::new();
        for file in &self.files {
            for dependency in &file.dependencies {
                if !sources.contains(dependency) {
                    sources.push(dependency.clone());
                }
            }
        }
        sources
    }

    /// Config files the batch resolved options from, deduplicated.
    pub fn config_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for file in &self.files {
            if let Some(path) = &file.config_path {
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
        paths
    }
}

/// Process `inputs` concurrently, then report and write in order.
///
/// A per-file failure aborts only that file: every other file is still
/// written and reported, in resolution order, before the first error (by
/// that same order) is returned.
pub fn run(
    inputs: &[InputId],
    session: &Session,
    registry: &Registry,
    graph: &DepGraph,
    ui: &Ui,
) -> RefractResult<BatchOutcome> {
    // Content reads stay sequential: stdin can only be consumed once, and
    // read errors should surface before any pipeline work starts.
    let mut contents = Vec::with_capacity(inputs.len());
    for input in inputs {
        contents.push((input.clone(), processor::read_input(input)?));
    }

    let results: Vec<RefractResult<Processed>> = contents
        .par_iter()
        .map(|(input, content)| processor::process_file(input, content, session, registry, graph))
        .collect();

    let mut files = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        let outcome = result.and_then(|processed| {
            processor::write_processed(&processed)?;
            Ok(processed)
        });
        match outcome {
            Ok(processed) => {
                if processed.plan.dest.is_some() {
                    ui.finished(&processed);
                } else {
                    // stdout mode: keep stderr noise down to warnings only
                    for warning in &processed.warnings {
                        ui.warning(&processed.input.label(), warning);
                    }
                }
                files.push(processed);
            }
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    ui.report_error(&error);
                }
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(BatchOutcome { files }),
    }
}
