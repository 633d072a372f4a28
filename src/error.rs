//! Error types for refract
//!
//! Every error carries the message the user sees; the binary only picks
//! where to render it.

use thiserror::Error;

use crate::pipeline::SyntaxError;

/// Result type alias for refract operations
pub type RefractResult<T> = Result<T, RefractError>;

/// Main error type for refract operations
#[derive(Error, Debug)]
pub enum RefractError {
    /// Bad input set or invalid flag combination for the input cardinality
    #[error("Input Error: {0}")]
    Input(String),

    /// Discovered config is malformed or sets options reserved for the CLI
    #[error("Config Error: {0}")]
    Config(String),

    /// Destination cannot be produced (truncation failure, stdout conflicts)
    #[error("Output Error: {0}")]
    Output(String),

    /// A named plugin or syntax is not resolvable
    #[error("Plugin Error: Cannot find module '{0}'")]
    Plugin(String),

    /// Parse failure from the transform pipeline, carries source context
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RefractError {
    /// Syntax errors are the one class that must not tear down watch mode.
    pub fn is_syntax(&self) -> bool {
        matches!(self, RefractError::Syntax(_))
    }
}
