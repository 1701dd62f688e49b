//! Parse error type for the Kiln reader and toplevel parser.

use std::fmt;

use kiln_common::diagnostic::{Note, Suggestion};
use kiln_common::error::LexError;
use kiln_common::span::Span;

/// A structured parse error.
///
/// Every error carries the primary span where the problem was detected
/// and a human-readable message. Secondary notes point at enclosing
/// forms for context, and suggestions offer pure text rewrites of the
/// offending source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub notes: Vec<Note>,
    pub suggestions: Vec<Suggestion>,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            notes: Vec::new(),
            suggestions: Vec::new(),
            help: None,
        }
    }

    /// Attach a secondary note pointing at `span`.
    pub fn with_note(mut self, message: impl Into<String>, span: Span) -> Self {
        self.notes.push(Note::new(message, span));
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.kind.to_string(), err.span)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::error::LexErrorKind;

    #[test]
    fn builder_accumulates_context() {
        let err = ParseError::new("missing declared type", Span::new(0, 11))
            .with_note("when parsing declare", Span::new(0, 11))
            .with_suggestion(Suggestion::remove("remove it", Span::new(1, 2)))
            .with_help("add a type");
        assert_eq!(err.notes.len(), 1);
        assert_eq!(err.suggestions.len(), 1);
        assert_eq!(err.help.as_deref(), Some("add a type"));
        assert_eq!(err.to_string(), "missing declared type");
    }

    #[test]
    fn from_lex_error() {
        let err: ParseError =
            LexError::new(LexErrorKind::UnterminatedString, Span::new(3, 9)).into();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.span, Span::new(3, 9));
    }
}
