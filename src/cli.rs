//! Command-line surface
//!
//! Parses flags with clap and validates the combinations that depend on
//! input cardinality: stdin forbids `--dir`/`--replace`/`--watch`, multiple
//! inputs need an explicit destination, and an external source map cannot
//! target stdout. Validation happens before any file is touched.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::{RefractError, RefractResult};
use crate::output::OutputMode;
use crate::pipeline::MapMode;
use crate::processor::InputId;

/// refract - pluggable text-transformation pipeline runner
#[derive(Parser, Debug)]
#[command(name = "refract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input files (reads stdin when omitted)
    pub input: Vec<PathBuf>,

    /// Write all output to this file
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,

    /// Write one output file per input into this directory
    #[arg(short, long, value_name = "path", conflicts_with_all = ["output", "replace"])]
    pub dir: Option<PathBuf>,

    /// Rewrite input files in place
    #[arg(short, long, conflicts_with = "output")]
    pub replace: bool,

    /// Extension for output files
    #[arg(long, value_name = "ext")]
    pub ext: Option<String>,

    /// Mirror directory structure relative to this base path
    #[arg(long, value_name = "path")]
    pub base: Option<PathBuf>,

    /// Rebuild when inputs or their dependencies change
    #[arg(short, long)]
    pub watch: bool,

    /// Poll for changes instead of native events (interval in ms)
    #[arg(long, value_name = "ms", num_args = 0..=1, default_missing_value = "100")]
    pub poll: Option<u64>,

    /// Write an external source map next to each output
    #[arg(long, conflicts_with = "no_map")]
    pub map: bool,

    /// Disable source maps entirely
    #[arg(long = "no-map")]
    pub no_map: bool,

    /// Apply these plugins, skipping config discovery
    #[arg(short = 'u', long = "use", value_name = "plugin")]
    pub use_plugins: Vec<String>,

    /// Parse with this syntax
    #[arg(long, value_name = "syntax")]
    pub parser: Option<String>,

    /// Parse and stringify with this syntax
    #[arg(long, value_name = "syntax")]
    pub syntax: Option<String>,

    /// Stringify with this syntax
    #[arg(long, value_name = "syntax")]
    pub stringifier: Option<String>,

    /// Explicit config file path, skipping discovery
    #[arg(long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Environment name exported as REFRACT_ENV
    #[arg(long, value_name = "name")]
    pub env: Option<String>,
}

/// Validated, resolved run parameters threaded through every per-file call.
#[derive(Debug, Clone)]
pub struct Session {
    /// Inputs in resolution order; this order is authoritative for
    /// aggregate-mode concatenation
    pub inputs: Vec<InputId>,
    pub mode: OutputMode,
    /// CLI-level map override; per-file config fills the gap when `None`
    pub map: Option<MapMode>,
    /// `--use` plugin list; non-empty means config discovery is skipped
    pub plugins: Vec<String>,
    pub parser: Option<String>,
    pub syntax: Option<String>,
    pub stringifier: Option<String>,
    pub config: Option<PathBuf>,
    pub base: Option<PathBuf>,
    pub ext: Option<String>,
    pub watch: bool,
    pub poll: Option<u64>,
}

impl Cli {
    /// Validate flag combinations and resolve the input set.
    pub fn into_session(self) -> RefractResult<Session> {
        let inputs = resolve_inputs(&self.input, self.dir.is_some(), self.replace, self.watch)?;

        if inputs.len() > 1
            && self.dir.is_none()
            && !self.replace
            && self.output.is_none()
        {
            return Err(RefractError::Input(
                "Must use --dir, --replace or --output with multiple input files".to_string(),
            ));
        }

        let mode = OutputMode::determine(
            self.output.as_deref(),
            self.dir.as_deref(),
            self.replace,
            inputs.len(),
        );

        let map = if self.map {
            Some(MapMode::External)
        } else if self.no_map {
            Some(MapMode::Off)
        } else {
            None
        };

        if map == Some(MapMode::External) && mode == OutputMode::Stdout {
            return Err(RefractError::Output(
                "Cannot output external sourcemaps when writing to STDOUT".to_string(),
            ));
        }

        let config = match self.config {
            Some(path) => Some(std::path::absolute(&path)?),
            None => None,
        };

        Ok(Session {
            inputs,
            mode,
            map,
            plugins: self.use_plugins,
            parser: self.parser,
            syntax: self.syntax,
            stringifier: self.stringifier,
            config,
            base: self.base,
            ext: self.ext,
            watch: self.watch,
            poll: self.poll,
        })
    }
}

/// Resolve the raw input list to absolute, deduplicated identities, or the
/// stdin sentinel when no files were given.
fn resolve_inputs(
    input: &[PathBuf],
    has_dir: bool,
    replace: bool,
    watch: bool,
) -> RefractResult<Vec<InputId>> {
    if input.is_empty() {
        if has_dir || replace {
            return Err(RefractError::Input(
                "Cannot use --dir or --replace when reading from stdin".to_string(),
            ));
        }
        if watch {
            return Err(RefractError::Input(
                "Cannot run in watch mode when reading from stdin".to_string(),
            ));
        }
        return Ok(vec![InputId::Stdin]);
    }

    let mut resolved = Vec::with_capacity(input.len());
    for path in input {
        let absolute = std::path::absolute(path)?;
        let canonical = canonicalize_lenient(&absolute);
        let id = InputId::Path(canonical);
        if !resolved.contains(&id) {
            resolved.push(id);
        }
    }
    Ok(resolved)
}

/// Canonicalize when the file exists so watch-event paths compare equal;
/// fall back to the absolute form for not-yet-existing paths.
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
