//! Terminal status output
//!
//! Status lines go to stderr so stdout stays clean for pipeline output.
//! Styling is applied only when stderr is a terminal.

use std::time::Duration;

use crossterm::style::Stylize;
use is_terminal::IsTerminal;

use crate::error::RefractError;
use crate::pipeline::Diagnostic;
use crate::processor::Processed;

/// Stderr status reporter.
#[derive(Debug, Clone, Copy)]
pub struct Ui {
    color: bool,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self { color: false }
    }

    /// One finished file: label, elapsed time, then any warnings.
    pub fn finished(&self, processed: &Processed) {
        let line = format!(
            "Finished {} ({})",
            processed.input.label(),
            format_elapsed(processed.elapsed)
        );
        if self.color {
            eprintln!("{}", line.green().bold());
        } else {
            eprintln!("{line}");
        }
        for warning in &processed.warnings {
            self.warning(&processed.input.label(), warning);
        }
    }

    pub fn warning(&self, label: &str, diagnostic: &Diagnostic) {
        let location = match diagnostic.line {
            Some(line) => format!("{label}:{line}"),
            None => label.to_string(),
        };
        let line = format!(
            "Warning: {location}: {} [{}]",
            diagnostic.message, diagnostic.plugin
        );
        if self.color {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{line}");
        }
    }

    pub fn waiting(&self) {
        let line = "Waiting for file changes...";
        if self.color {
            eprintln!("{}", line.cyan().bold());
        } else {
            eprintln!("{line}");
        }
    }

    pub fn changed(&self, label: &str) {
        eprintln!("Changed: {label}");
    }

    /// Terminal error reporting; syntax errors get their source excerpt.
    pub fn report_error(&self, err: &RefractError) {
        match err {
            RefractError::Syntax(syntax) => {
                let heading = format!("Syntax Error: {syntax}");
                if self.color {
                    eprintln!("{}", heading.red().bold());
                } else {
                    eprintln!("{heading}");
                }
                let excerpt = syntax.show_source();
                if !excerpt.is_empty() {
                    eprintln!("\n{excerpt}");
                }
            }
            other => {
                let line = other.to_string();
                if self.color {
                    eprintln!("{}", line.red().bold());
                } else {
                    eprintln!("{line}");
                }
            }
        }
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact human duration: sub-second in ms, otherwise seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}
