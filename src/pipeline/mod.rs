//! Transform pipeline
//!
//! A pipeline run is: parse (syntax) -> plugins -> stringify (syntax),
//! plus optional source-map emission. Plugins and syntaxes are looked up by
//! name in a [`Registry`]; the capability interface is the [`Plugin`] and
//! [`Syntax`] traits, so the orchestrator never cares what a plugin does,
//! only what it returns: output text, warnings, and structured messages of
//! which the `dependency` kind drives watch-mode invalidation.

mod plugins;
mod syntax;

pub use plugins::{default_registry, Plugin, PluginCtx, Registry};
pub use syntax::{CssSyntax, PlainSyntax, Syntax};

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{RefractError, RefractResult};

/// Name of the syntax used when none is requested.
pub const DEFAULT_SYNTAX: &str = "css";

/// How source maps are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Append the map to the output as a base64 data-URI comment (default)
    Inline,
    /// Write a sibling `.map` file next to the destination
    External,
    /// No map at all
    Off,
}

/// A non-fatal diagnostic emitted by a plugin or syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub plugin: String,
    pub message: String,
    pub line: Option<usize>,
}

/// Structured message emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The processed file transitively depends on this path.
    Dependency { file: PathBuf },
}

/// Parse failure carrying enough context to render a source excerpt.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub file: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub message: String,
    source_text: String,
}

impl SyntaxError {
    pub fn new(
        file: Option<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
        source_text: &str,
    ) -> Self {
        Self {
            file,
            line,
            column,
            message: message.into(),
            source_text: source_text.to_string(),
        }
    }

    /// Caret-annotated excerpt of the offending line with up to two lines
    /// of leading context.
    pub fn show_source(&self) -> String {
        let lines: Vec<&str> = self.source_text.lines().collect();
        if self.line == 0 || self.line > lines.len() {
            return String::new();
        }

        let first = self.line.saturating_sub(3);
        let width = format!("{}", self.line).len();

        let mut out = String::new();
        for (idx, text) in lines.iter().enumerate().take(self.line).skip(first) {
            let number = idx + 1;
            let marker = if number == self.line { ">" } else { " " };
            out.push_str(&format!("{marker} {number:>width$} | {text}\n"));
            if number == self.line {
                let pad = " ".repeat(width + 5 + self.column.saturating_sub(1));
                out.push_str(&format!("{pad}^\n"));
            }
        }
        out
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{}:{}:{}: {}",
                file.display(),
                self.line,
                self.column,
                self.message
            ),
            None => write!(f, "{}:{}: {}", self.line, self.column, self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Everything a single pipeline run needs to know.
#[derive(Debug)]
pub struct TransformRequest<'a> {
    /// Source identity (real path, or a `cwd/stdin` pseudo path)
    pub from: &'a Path,
    /// Destination identity, if any
    pub to: Option<&'a Path>,
    pub map: MapMode,
    pub parser: Option<&'a str>,
    pub syntax: Option<&'a str>,
    pub stringifier: Option<&'a str>,
    pub plugins: &'a [String],
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct TransformOutput {
    pub text: String,
    /// External source-map payload, present only in [`MapMode::External`]
    pub map: Option<String>,
    pub warnings: Vec<Diagnostic>,
    pub messages: Vec<Message>,
}

/// Run the full pipeline over `source`.
pub fn run(
    source: &str,
    request: &TransformRequest<'_>,
    registry: &Registry,
) -> RefractResult<TransformOutput> {
    let parse_name = request.syntax.or(request.parser).unwrap_or(DEFAULT_SYNTAX);
    let print_name = request
        .syntax
        .or(request.stringifier)
        .unwrap_or(DEFAULT_SYNTAX);

    let parser = registry
        .syntax(parse_name)
        .ok_or_else(|| RefractError::Plugin(parse_name.to_string()))?;
    let printer = registry
        .syntax(print_name)
        .ok_or_else(|| RefractError::Plugin(print_name.to_string()))?;

    let mut document = parser.parse(source, Some(request.from))?;

    let mut ctx = PluginCtx::new(request.from);
    for name in request.plugins {
        let plugin = registry
            .plugin(name)
            .ok_or_else(|| RefractError::Plugin(name.clone()))?;
        document = plugin.transform(&document, &mut ctx)?;
    }

    let mut text = printer.stringify(document);

    let map = match request.map {
        MapMode::Off => None,
        MapMode::Inline => {
            let payload = map_payload(request.from, request.to, &ctx.messages);
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!(
                "/*# sourceMappingURL=data:application/json;base64,{} */",
                BASE64.encode(payload.as_bytes())
            ));
            None
        }
        MapMode::External => Some(map_payload(request.from, request.to, &ctx.messages)),
    };

    Ok(TransformOutput {
        text,
        map,
        warnings: ctx.warnings,
        messages: ctx.messages,
    })
}

/// Minimal v3 source-map payload: the input plus every inlined dependency.
fn map_payload(from: &Path, to: Option<&Path>, messages: &[Message]) -> String {
    let mut sources = vec![from.display().to_string()];
    for message in messages {
        let Message::Dependency { file } = message;
        let source = file.display().to_string();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    let mut payload = serde_json::json!({
        "version": 3,
        "sources": sources,
        "mappings": "",
    });
    if let Some(to) = to {
        payload["file"] = serde_json::Value::String(to.display().to_string());
    }
    payload.to_string()
}
