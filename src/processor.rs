//! Single-file processing
//!
//! One file, one pass: resolve config, plan the destination, run the
//! pipeline, record dependency messages into the graph. Writes happen
//! afterwards (see the batch runner) so aggregate appends land in
//! input-resolution order no matter how the parallel runs complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cli::Session;
use crate::config::{self, ConfigLookup};
use crate::dep_graph::DepGraph;
use crate::error::{RefractError, RefractResult};
use crate::output::{self, OutputPlan};
use crate::pipeline::{self, Diagnostic, MapMode, Message, Registry, TransformRequest};

/// Identity of one source: a real path, or the single stdin pseudo-file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputId {
    Stdin,
    Path(PathBuf),
}

impl InputId {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            InputId::Stdin => None,
            InputId::Path(path) => Some(path),
        }
    }

    /// Source identity handed to the pipeline. Stdin gets a stable pseudo
    /// path under the working directory.
    pub fn from_path(&self) -> PathBuf {
        match self {
            InputId::Stdin => std::env::current_dir()
                .unwrap_or_default()
                .join("stdin"),
            InputId::Path(path) => path.clone(),
        }
    }

    /// Short human label: path relative to the working directory, or "stdin".
    pub fn label(&self) -> String {
        match self {
            InputId::Stdin => "stdin".to_string(),
            InputId::Path(path) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                path.strip_prefix(&cwd)
                    .unwrap_or(path)
                    .display()
                    .to_string()
            }
        }
    }
}

/// Effective per-file options after merging CLI overrides with discovery.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub plugins: Vec<String>,
    pub map: MapMode,
    pub parser: Option<String>,
    pub syntax: Option<String>,
    pub stringifier: Option<String>,
    /// Config file the options came from, if discovery found one
    pub config_path: Option<PathBuf>,
    /// Non-fatal notes from config loading (unknown keys)
    pub warnings: Vec<Diagnostic>,
}

/// Resolve effective options for one input.
///
/// A CLI plugin list (`--use`) and file-based discovery are mutually
/// exclusive: when the CLI names plugins, discovery is skipped entirely.
pub fn resolve_options(input: &InputId, session: &Session) -> RefractResult<ResolvedOptions> {
    if !session.plugins.is_empty() {
        return Ok(ResolvedOptions {
            plugins: session.plugins.clone(),
            map: session.map.unwrap_or(MapMode::Inline),
            parser: session.parser.clone(),
            syntax: session.syntax.clone(),
            stringifier: session.stringifier.clone(),
            config_path: None,
            warnings: Vec::new(),
        });
    }

    let lookup = match &session.config {
        Some(path) => {
            let (config, warnings) = config::load(path)?;
            ConfigLookup::Found {
                config,
                path: path.clone(),
                warnings,
            }
        }
        None => {
            let start = match input.as_path().and_then(Path::parent) {
                Some(dir) => dir.to_path_buf(),
                None => std::env::current_dir()?,
            };
            config::discover(&start)?
        }
    };

    let (config, config_path, config_warnings) = match lookup {
        ConfigLookup::Found {
            config,
            path,
            warnings,
        } => (config, Some(path), warnings),
        ConfigLookup::NotFound => (Default::default(), None, Vec::new()),
    };

    let map = match session.map {
        Some(mode) => mode,
        None => config.map_mode()?.unwrap_or(MapMode::Inline),
    };

    let warnings = config_warnings
        .into_iter()
        .map(|w| Diagnostic {
            plugin: "config".to_string(),
            message: format!("unknown key '{}' in {}", w.key, w.file.display()),
            line: None,
        })
        .collect();

    Ok(ResolvedOptions {
        plugins: config.plugins.clone(),
        map,
        parser: session.parser.clone().or(config.options.parser),
        syntax: session.syntax.clone().or(config.options.syntax),
        stringifier: session.stringifier.clone().or(config.options.stringifier),
        config_path,
        warnings,
    })
}

/// Fully processed artifact, ready to write.
#[derive(Debug)]
pub struct Processed {
    pub input: InputId,
    pub plan: OutputPlan,
    pub text: String,
    pub map: Option<String>,
    pub warnings: Vec<Diagnostic>,
    pub dependencies: Vec<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Process one file's content end to end. Dependency messages are added to
/// the graph as a side effect; this is how transitive includes become
/// watch-tracked.
pub fn process_file(
    input: &InputId,
    content: &str,
    session: &Session,
    registry: &Registry,
    graph: &DepGraph,
) -> RefractResult<Processed> {
    let started = Instant::now();

    let options = resolve_options(input, session)?;
    let plan = output::plan(
        &session.mode,
        input,
        session.base.as_deref(),
        session.ext.as_deref(),
    )?;

    if options.map == MapMode::External && plan.dest.is_none() {
        return Err(RefractError::Output(
            "Cannot output external sourcemaps when writing to STDOUT".to_string(),
        ));
    }

    let from = input.from_path();
    let request = TransformRequest {
        from: &from,
        to: plan.dest.as_deref(),
        map: options.map,
        parser: options.parser.as_deref(),
        syntax: options.syntax.as_deref(),
        stringifier: options.stringifier.as_deref(),
        plugins: &options.plugins,
    };

    let result = pipeline::run(content, &request, registry)?;

    let dependencies: Vec<PathBuf> = result
        .messages
        .iter()
        .map(|Message::Dependency { file }| file.clone())
        .collect();
    for dependency in &dependencies {
        graph.add(&from, dependency);
    }

    let mut warnings = options.warnings;
    warnings.extend(result.warnings);

    Ok(Processed {
        input: input.clone(),
        plan,
        text: result.text,
        map: result.map,
        warnings,
        dependencies,
        config_path: options.config_path,
        elapsed: started.elapsed(),
    })
}

/// Write the primary output, then the map sibling if one was produced.
pub fn write_processed(processed: &Processed) -> RefractResult<()> {
    output::write_plan(&processed.plan, &processed.text)?;

    if let (Some(map), Some(dest)) = (&processed.map, &processed.plan.dest) {
        output::write_atomic(&output::map_sibling(dest), map)?;
    }
    Ok(())
}

/// Read one input's content. Empty stdin is an input error.
pub fn read_input(input: &InputId) -> RefractResult<String> {
    match input {
        InputId::Stdin => {
            use std::io::Read;
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            if content.is_empty() {
                return Err(RefractError::Input(
                    "Did not receive any STDIN".to_string(),
                ));
            }
            Ok(content)
        }
        InputId::Path(path) => Ok(fs::read_to_string(path)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;
    use crate::pipeline::default_registry;
    use tempfile::tempdir;

    fn session_for(_dir: &Path, mode: OutputMode) -> Session {
        Session {
            inputs: Vec::new(),
            mode,
            map: Some(MapMode::Off),
            plugins: vec!["inline-imports".to_string()],
            parser: None,
            syntax: None,
            stringifier: None,
            config: None,
            base: None,
            ext: None,
            watch: false,
            poll: None,
        }
    }

    #[test]
    fn test_process_file_records_dependencies_in_graph() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("partial.css"), "b { }\n").unwrap();
        let main = dir.path().join("main.css");
        fs::write(&main, "@import \"partial.css\";\n").unwrap();

        let session = session_for(dir.path(), OutputMode::Stdout);
        let registry = default_registry();
        let graph = DepGraph::new();
        let input = InputId::Path(main.clone());

        let processed = process_file(
            &input,
            "@import \"partial.css\";\n",
            &session,
            &registry,
            &graph,
        )
        .unwrap();

        assert_eq!(processed.text, "b { }\n");
        assert_eq!(processed.dependencies.len(), 1);
        let partial = fs::canonicalize(dir.path().join("partial.css")).unwrap();
        assert_eq!(graph.dependents_of(&partial), vec![main]);
    }

    #[test]
    fn test_external_map_with_stdout_is_rejected_before_pipeline() {
        let dir = tempdir().unwrap();
        let mut session = session_for(dir.path(), OutputMode::Stdout);
        session.map = Some(MapMode::External);
        // a plugin that would fail loudly if the pipeline ran
        session.plugins = vec!["does-not-exist".to_string()];

        let registry = default_registry();
        let graph = DepGraph::new();
        let err = process_file(
            &InputId::Path(dir.path().join("a.css")),
            "a { }\n",
            &session,
            &registry,
            &graph,
        )
        .unwrap_err();

        assert!(matches!(err, RefractError::Output(_)));
        assert!(err
            .to_string()
            .contains("Cannot output external sourcemaps when writing to STDOUT"));
    }

    #[test]
    fn test_resolve_options_cli_plugins_skip_discovery() {
        let dir = tempdir().unwrap();
        // a discovered config would add strip-comments; --use must win
        fs::write(
            dir.path().join(".refractrc.toml"),
            "plugins = [\"strip-comments\"]\n",
        )
        .unwrap();

        let session = session_for(dir.path(), OutputMode::Stdout);
        let input = InputId::Path(dir.path().join("a.css"));
        let options = resolve_options(&input, &session).unwrap();

        assert_eq!(options.plugins, vec!["inline-imports"]);
        assert!(options.config_path.is_none());
    }

    #[test]
    fn test_resolve_options_discovers_config_per_file_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".refractrc.toml"),
            "plugins = [\"compact\"]\n[options]\nmap = \"none\"\n",
        )
        .unwrap();

        let mut session = session_for(dir.path(), OutputMode::Stdout);
        session.plugins = Vec::new();
        session.map = None;

        let input = InputId::Path(dir.path().join("a.css"));
        let options = resolve_options(&input, &session).unwrap();

        assert_eq!(options.plugins, vec!["compact"]);
        assert_eq!(options.map, MapMode::Off);
        assert_eq!(
            options.config_path,
            Some(dir.path().join(".refractrc.toml"))
        );
    }

    #[test]
    fn test_write_processed_emits_map_sibling() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.css");
        let processed = Processed {
            input: InputId::Path(dir.path().join("a.css")),
            plan: OutputPlan {
                dest: Some(dest.clone()),
                append: false,
            },
            text: "a { }\n".to_string(),
            map: Some("{\"version\":3}".to_string()),
            warnings: Vec::new(),
            dependencies: Vec::new(),
            config_path: None,
            elapsed: Duration::from_millis(1),
        };

        write_processed(&processed).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "a { }\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("out.css.map")).unwrap(),
            "{\"version\":3}"
        );
    }
}
