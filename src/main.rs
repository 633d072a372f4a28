//! refract CLI entry point
//!
//! Exit contract: 0 on success (warnings included), 1 on any fatal error.
//! Watch mode never auto-exits on a per-file syntax error; it reports and
//! keeps watching.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use refract::cli::Cli;
use refract::dep_graph::DepGraph;
use refract::error::{RefractError, RefractResult};
use refract::output::OutputMode;
use refract::pipeline::default_registry;
use refract::ui::Ui;
use refract::watcher::WatchEvent;
use refract::{batch, output, watcher, Session};

fn main() {
    let cli = Cli::parse();
    let ui = Ui::new();

    if let Err(err) = run(cli, &ui) {
        ui.report_error(&err);
        process::exit(1);
    }
}

fn run(cli: Cli, ui: &Ui) -> RefractResult<()> {
    if let Some(env) = &cli.env {
        std::env::set_var("REFRACT_ENV", env);
    }

    let session = cli.into_session()?;
    let registry = default_registry();
    validate_names(&session, &registry)?;

    let graph = DepGraph::new();

    if let OutputMode::Aggregate { dest } = &session.mode {
        output::truncate_destination(dest)?;
    }

    // Initial full build. In watch mode a syntax error is reported but the
    // watcher still starts; the next edit can fix it.
    let outcome = match batch::run(&session.inputs, &session, &registry, &graph, ui) {
        Ok(outcome) => Some(outcome),
        Err(err) if session.watch && err.is_syntax() => {
            ui.report_error(&err);
            None
        }
        Err(err) => return Err(err),
    };

    if session.watch {
        run_watch(&session, &registry, &graph, outcome, ui)?;
    }

    Ok(())
}

fn run_watch(
    session: &Session,
    registry: &refract::Registry,
    graph: &DepGraph,
    outcome: Option<batch::BatchOutcome>,
    ui: &Ui,
) -> RefractResult<()> {
    let running = Arc::new(AtomicBool::new(true));
    let running_watch = running.clone();

    ctrlc::set_handler(move || {
        running_watch.store(false, Ordering::SeqCst);
    })
    .map_err(|e| RefractError::Io(std::io::Error::other(e.to_string())))?;

    let config_paths = outcome
        .as_ref()
        .map(|o| o.config_paths())
        .unwrap_or_default();

    watcher::watch(
        session,
        registry,
        graph,
        &config_paths,
        running,
        ui,
        |event| match event {
            WatchEvent::Ready => ui.waiting(),
            WatchEvent::Changed { path } => ui.changed(&path.display().to_string()),
            WatchEvent::RebuildStarted { .. } | WatchEvent::RebuildSucceeded => {}
            WatchEvent::BuildFailed { error } => ui.report_error(&error),
        },
    )
}

/// Names given on the CLI must resolve before any file is touched.
fn validate_names(session: &Session, registry: &refract::Registry) -> RefractResult<()> {
    for plugin in &session.plugins {
        if !registry.has_plugin(plugin) {
            return Err(RefractError::Plugin(plugin.clone()));
        }
    }
    for syntax in [&session.parser, &session.syntax, &session.stringifier]
        .into_iter()
        .flatten()
    {
        if !registry.has_syntax(syntax) {
            return Err(RefractError::Plugin(syntax.clone()));
        }
    }
    Ok(())
}
