//! Parse/stringify seams
//!
//! A [`Syntax`] owns both halves of the round trip; `--parser` and
//! `--stringifier` let the CLI mix halves from different syntaxes. The
//! built-in `css` syntax is a validator, not a real parser: it checks block,
//! comment, and string balance with line/column tracking so syntax errors
//! come out with usable positions.

use std::path::Path;

use super::SyntaxError;

/// Parse and stringify seam for the pipeline.
pub trait Syntax: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate and normalize `source` into the pipeline's working document.
    fn parse(&self, source: &str, file: Option<&Path>) -> Result<String, SyntaxError>;

    /// Render the working document back to output text.
    fn stringify(&self, document: String) -> String;
}

/// No validation at all; bytes in, bytes out.
pub struct PlainSyntax;

impl Syntax for PlainSyntax {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn parse(&self, source: &str, _file: Option<&Path>) -> Result<String, SyntaxError> {
        Ok(source.to_string())
    }

    fn stringify(&self, document: String) -> String {
        document
    }
}

/// Balance validator for CSS-shaped input.
pub struct CssSyntax;

impl Syntax for CssSyntax {
    fn name(&self) -> &'static str {
        "css"
    }

    fn parse(&self, source: &str, file: Option<&Path>) -> Result<String, SyntaxError> {
        validate_balance(source, file)?;
        Ok(source.to_string())
    }

    fn stringify(&self, document: String) -> String {
        document
    }
}

/// Scanner state while validating.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Code,
    Comment,
    Quoted(char),
}

fn validate_balance(source: &str, file: Option<&Path>) -> Result<(), SyntaxError> {
    let err = |line: usize, column: usize, message: &str| {
        SyntaxError::new(
            file.map(Path::to_path_buf),
            line,
            column,
            message,
            source,
        )
    };

    let mut state = ScanState::Code;
    // positions of unmatched '{', so "unclosed block" points at the opener
    let mut open_blocks: Vec<(usize, usize)> = Vec::new();
    let mut comment_start = (0, 0);
    let mut string_start = (0, 0);

    let mut line = 1;
    let mut column = 0;
    let mut prev = '\0';

    for ch in source.chars() {
        if ch == '\n' {
            if let ScanState::Quoted(_) = state {
                // CSS strings cannot contain a raw newline
                return Err(err(string_start.0, string_start.1, "Unterminated string"));
            }
            line += 1;
            column = 0;
            prev = '\0';
            continue;
        }
        column += 1;

        match state {
            ScanState::Code => match ch {
                '*' if prev == '/' => {
                    state = ScanState::Comment;
                    comment_start = (line, column - 1);
                }
                '"' | '\'' => {
                    state = ScanState::Quoted(ch);
                    string_start = (line, column);
                }
                '{' => open_blocks.push((line, column)),
                '}' => {
                    if open_blocks.pop().is_none() {
                        return Err(err(line, column, "Unexpected '}'"));
                    }
                }
                _ => {}
            },
            ScanState::Comment => {
                if ch == '/' && prev == '*' {
                    state = ScanState::Code;
                }
            }
            ScanState::Quoted(quote) => {
                if ch == quote && prev != '\\' {
                    state = ScanState::Code;
                }
            }
        }

        // a backslash escaping itself must not also escape the next char
        prev = if prev == '\\' && ch == '\\' { '\0' } else { ch };
    }

    match state {
        ScanState::Comment => Err(err(comment_start.0, comment_start.1, "Unclosed comment")),
        ScanState::Quoted(_) => Err(err(string_start.0, string_start.1, "Unterminated string")),
        ScanState::Code => match open_blocks.last() {
            Some(&(open_line, open_column)) => {
                Err(err(open_line, open_column, "Unclosed block"))
            }
            None => Ok(()),
        },
    }
}
