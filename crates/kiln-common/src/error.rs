use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// A lexer error with location information.
///
/// Errors are collected during lexing rather than aborting immediately so
/// the reader can still build a tree and report the first problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    /// A string literal was not closed before end of input.
    UnterminatedString,
    /// An invalid escape sequence was encountered in a string.
    InvalidEscapeSequence(char),
    /// A token that starts like a number but does not parse as one.
    InvalidNumberLiteral(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::InvalidEscapeSequence(c) => write!(f, "invalid escape sequence: \\{c}"),
            Self::InvalidNumberLiteral(s) => write!(f, "invalid number literal: {s}"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::new(LexErrorKind::UnterminatedString, Span::new(0, 4));
        assert_eq!(err.to_string(), "unterminated string literal");
        assert_eq!(
            LexErrorKind::InvalidEscapeSequence('q').to_string(),
            "invalid escape sequence: \\q"
        );
        assert_eq!(
            LexErrorKind::InvalidNumberLiteral("1.2.3".into()).to_string(),
            "invalid number literal: 1.2.3"
        );
    }
}
