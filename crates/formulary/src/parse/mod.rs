//! Recipe parser using winnow
//!
//! Source text goes through [`heredoc::normalize`] first, then the statement
//! grammar in [`stmt`]. Spans in the resulting tree are byte offsets into the
//! normalized text, which keeps the original line numbering.

mod expr;
mod heredoc;
mod lexical;
mod stmt;

use winnow::prelude::*;

use crate::ast::Span;
use crate::ast::syntax::Program;

/// Parse error with location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = offset_to_line_column(source, offset);
        ParseError {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// 1-based line and column for a byte offset.
fn offset_to_line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// A parsed recipe: the normalized text and its syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    source: String,
    program: Program,
}

impl Recipe {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn line_of(&self, offset: usize) -> usize {
        offset_to_line_column(&self.source, offset).0
    }

    /// First line of the text covered by `span`, trimmed.
    pub fn excerpt(&self, span: Span) -> &str {
        let end = span.end.min(self.source.len());
        let start = span.start.min(end);
        self.source[start..end]
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// Parse recipe source into a [`Recipe`].
pub fn parse(source: &str) -> Result<Recipe, ParseError> {
    let normalized = heredoc::normalize(source)?;
    let program = parse_program(&normalized)?;
    Ok(Recipe {
        source: normalized,
        program,
    })
}

fn parse_program(text: &str) -> Result<Program, ParseError> {
    let mut input = lexical::new_input(text);
    match stmt::program.parse_next(&mut input) {
        Ok(program) => Ok(program),
        Err(error) => {
            let remaining = lexical::rest(&input);
            let offset = text.len() - remaining.len();
            let message = match lexical::failure_label(&error) {
                Some(label) => format!("{label}: {}", unexpected(remaining)),
                None => unexpected(remaining),
            };
            Err(ParseError::at(text, offset, message))
        }
    }
}

fn unexpected(remaining: &str) -> String {
    let token: String = remaining
        .lines()
        .next()
        .unwrap_or_default()
        .trim_end()
        .chars()
        .take(24)
        .collect();
    if token.is_empty() {
        if remaining.is_empty() {
            "unexpected end of input".to_string()
        } else {
            "unexpected end of line".to_string()
        }
    } else {
        format!("unexpected `{token}`")
    }
}
