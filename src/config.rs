//! Per-file configuration discovery
//!
//! Each input may sit in a different directory and therefore a different
//! config scope, so discovery runs fresh for every file: walk upward from
//! the file's directory (the working directory for stdin) looking for a
//! recognized config file. Absence of a config file is an expected lookup
//! result, not an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RefractError, RefractResult};
use crate::pipeline::MapMode;

/// Recognized config file names, in lookup order.
pub const CONFIG_FILE_NAMES: &[&str] = &[".refractrc.toml", "refract.config.toml"];

/// Parsed config file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub options: ConfigOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOptions {
    /// "inline", "file", or "none"
    pub map: Option<String>,
    pub parser: Option<String>,
    pub syntax: Option<String>,
    pub stringifier: Option<String>,

    // Input/output paths may only come from the CLI. Deserialized so their
    // presence can be rejected with a pointed message.
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ConfigFile {
    pub fn map_mode(&self) -> RefractResult<Option<MapMode>> {
        match self.options.map.as_deref() {
            None => Ok(None),
            Some("inline") => Ok(Some(MapMode::Inline)),
            Some("file") => Ok(Some(MapMode::External)),
            Some("none") => Ok(Some(MapMode::Off)),
            Some(other) => Err(RefractError::Config(format!(
                "invalid map mode '{other}', expected 'inline', 'file' or 'none'"
            ))),
        }
    }
}

/// Non-fatal warning for an unrecognized config key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

/// Outcome of config discovery. "Not found" is the one expected negative
/// result; it is a variant, not an error.
#[derive(Debug)]
pub enum ConfigLookup {
    Found {
        config: ConfigFile,
        path: PathBuf,
        warnings: Vec<ConfigWarning>,
    },
    NotFound,
}

/// Search upward from `start` for a recognized config file and load the
/// first hit.
pub fn discover(start: &Path) -> RefractResult<ConfigLookup> {
    for dir in start.ancestors() {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let (config, warnings) = load(&candidate)?;
                return Ok(ConfigLookup::Found {
                    config,
                    path: candidate,
                    warnings,
                });
            }
        }
    }
    Ok(ConfigLookup::NotFound)
}

/// Load and validate an explicit config file path.
pub fn load(path: &Path) -> RefractResult<(ConfigFile, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path).map_err(|e| {
        RefractError::Config(format!("cannot read config file {}: {e}", path.display()))
    })?;

    let mut unknown_keys: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);
    let config: ConfigFile = serde_ignored::deserialize(deserializer, |key| {
        unknown_keys.push(key.to_string());
    })
    .map_err(|e| {
        RefractError::Config(format!("malformed config file {}: {e}", path.display()))
    })?;

    validate(&config)?;

    let warnings = unknown_keys
        .into_iter()
        .map(|key| ConfigWarning {
            key,
            file: path.to_path_buf(),
        })
        .collect();

    Ok((config, warnings))
}

fn validate(config: &ConfigFile) -> RefractResult<()> {
    if config.options.from.is_some() || config.options.to.is_some() {
        return Err(RefractError::Config(
            "Cannot set from or to options in config file, use CLI arguments instead".to_string(),
        ));
    }
    config.map_mode()?;
    Ok(())
}
