//! Built-in plugins and the name registry
//!
//! Plugins are looked up by the name given on the CLI (`--use`) or in the
//! config file. The registry is the whole "loading" story: a name that is
//! not registered is a plugin error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::syntax::{CssSyntax, PlainSyntax, Syntax};
use super::{Diagnostic, Message, SyntaxError};

/// Maximum `@import` nesting before the inliner gives up.
const MAX_IMPORT_DEPTH: usize = 32;

/// A named text transformation.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, source: &str, ctx: &mut PluginCtx<'_>) -> Result<String, SyntaxError>;
}

/// Shared state for one pipeline run: warnings and structured messages
/// accumulate across plugins.
pub struct PluginCtx<'a> {
    pub from: &'a Path,
    pub warnings: Vec<Diagnostic>,
    pub messages: Vec<Message>,
}

impl<'a> PluginCtx<'a> {
    pub fn new(from: &'a Path) -> Self {
        Self {
            from,
            warnings: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn warn(&mut self, plugin: &str, message: impl Into<String>, line: Option<usize>) {
        self.warnings.push(Diagnostic {
            plugin: plugin.to_string(),
            message: message.into(),
            line,
        });
    }

    /// Record that the processed file depends on `file`.
    pub fn dependency(&mut self, file: PathBuf) {
        let message = Message::Dependency { file };
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }
}

/// Name -> implementation tables for plugins and syntaxes.
pub struct Registry {
    plugins: BTreeMap<&'static str, Arc<dyn Plugin>>,
    syntaxes: BTreeMap<&'static str, Arc<dyn Syntax>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
            syntaxes: BTreeMap::new(),
        }
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    pub fn register_syntax(&mut self, syntax: Arc<dyn Syntax>) {
        self.syntaxes.insert(syntax.name(), syntax);
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn syntax(&self, name: &str) -> Option<Arc<dyn Syntax>> {
        self.syntaxes.get(name).cloned()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn has_syntax(&self, name: &str) -> bool {
        self.syntaxes.contains_key(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in plugin and syntax.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_syntax(Arc::new(CssSyntax));
    registry.register_syntax(Arc::new(PlainSyntax));
    registry.register_plugin(Arc::new(InlineImports));
    registry.register_plugin(Arc::new(StripComments));
    registry.register_plugin(Arc::new(Compact));
    registry
}

/// Inlines `@import "path";` statements recursively, recording each inlined
/// file as a dependency message. This is the sole mechanism by which
/// transitive includes become watch-tracked.
pub struct InlineImports;

impl Plugin for InlineImports {
    fn name(&self) -> &'static str {
        "inline-imports"
    }

    fn transform(&self, source: &str, ctx: &mut PluginCtx<'_>) -> Result<String, SyntaxError> {
        let base = ctx
            .from
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        inline(source, &base, ctx.from.to_path_buf(), 0, ctx)
    }
}

fn inline(
    source: &str,
    base: &Path,
    file: PathBuf,
    depth: usize,
    ctx: &mut PluginCtx<'_>,
) -> Result<String, SyntaxError> {
    let mut out = String::with_capacity(source.len());

    for (idx, line) in source.lines().enumerate() {
        let number = idx + 1;
        let trimmed = line.trim_start();

        if !trimmed.starts_with("@import") {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let spec = parse_import_target(trimmed).ok_or_else(|| {
            SyntaxError::new(
                Some(file.clone()),
                number,
                line.len() - trimmed.len() + 1,
                "Malformed @import",
                source,
            )
        })?;

        if depth >= MAX_IMPORT_DEPTH {
            ctx.warn(
                "inline-imports",
                format!("Import depth limit reached at '{spec}'"),
                Some(number),
            );
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let target = base.join(&spec);
        match fs::read_to_string(&target) {
            Ok(content) => {
                let target = fs::canonicalize(&target).unwrap_or(target);
                ctx.dependency(target.clone());
                let nested_base = target
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base.to_path_buf());
                let inlined = inline(&content, &nested_base, target, depth + 1, ctx)?;
                out.push_str(&inlined);
            }
            Err(_) => {
                ctx.warn(
                    "inline-imports",
                    format!("Cannot resolve import '{spec}'"),
                    Some(number),
                );
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    Ok(out)
}

/// Accepts `@import "x";` and `@import 'x';`, with or without the
/// trailing semicolon.
fn parse_import_target(line: &str) -> Option<String> {
    let rest = line.strip_prefix("@import")?.trim();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    let spec = &rest[..end];
    let tail = rest[end + 1..].trim();
    if !(tail.is_empty() || tail == ";") {
        return None;
    }
    if spec.is_empty() {
        return None;
    }
    Some(spec.to_string())
}

/// Removes `/* ... */` comments, leaving strings intact.
pub struct StripComments;

impl Plugin for StripComments {
    fn name(&self) -> &'static str {
        "strip-comments"
    }

    fn transform(&self, source: &str, _ctx: &mut PluginCtx<'_>) -> Result<String, SyntaxError> {
        let mut out = String::with_capacity(source.len());
        let mut chars = source.chars().peekable();
        let mut quoted: Option<char> = None;

        while let Some(ch) = chars.next() {
            match quoted {
                Some(quote) => {
                    out.push(ch);
                    if ch == quote {
                        quoted = None;
                    }
                }
                None => {
                    if ch == '/' && chars.peek() == Some(&'*') {
                        chars.next();
                        let mut prev = '\0';
                        for inner in chars.by_ref() {
                            if prev == '*' && inner == '/' {
                                break;
                            }
                            prev = inner;
                        }
                    } else {
                        if ch == '"' || ch == '\'' {
                            quoted = Some(ch);
                        }
                        out.push(ch);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Trims trailing whitespace and collapses runs of blank lines.
pub struct Compact;

impl Plugin for Compact {
    fn name(&self) -> &'static str {
        "compact"
    }

    fn transform(&self, source: &str, _ctx: &mut PluginCtx<'_>) -> Result<String, SyntaxError> {
        let mut out = String::with_capacity(source.len());
        let mut blank_run = 0;
        for line in source.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}
