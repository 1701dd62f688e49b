//! Building blocks shared by parse and type diagnostics.
//!
//! A diagnostic is always a value: a primary span and message, plus
//! optional secondary [`Note`]s and [`Suggestion`]s. Suggestions carry a
//! pure text transform that a caller may apply to the text under the
//! suggestion's span; nothing in the front end applies them itself.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A secondary message attached to a diagnostic, usually pointing at an
/// enclosing definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub message: String,
    pub span: Span,
}

impl Note {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// A suggested textual fix: old source text in, corrected text out.
pub type Replacement = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct Suggestion {
    pub message: String,
    pub span: Span,
    replace: Replacement,
}

impl Suggestion {
    pub fn new(
        message: impl Into<String>,
        span: Span,
        replace: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            span,
            replace: Arc::new(replace),
        }
    }

    /// Suggest deleting the text under `span`.
    pub fn remove(message: impl Into<String>, span: Span) -> Self {
        Self::new(message, span, |_| String::new())
    }

    /// Suggest replacing the text under `span` with fixed text.
    pub fn replace_with(message: impl Into<String>, span: Span, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(message, span, move |_| text.clone())
    }

    /// Compute the replacement for `old`, the text currently under the span.
    pub fn replacement(&self, old: &str) -> String {
        (self.replace)(old)
    }

    /// Apply the suggestion to a whole source file, returning the new text.
    pub fn apply(&self, source: &str) -> String {
        let range = self.span.range();
        let old = source.get(range.clone()).unwrap_or("");
        let mut out = String::with_capacity(source.len());
        out.push_str(&source[..range.start.min(source.len())]);
        out.push_str(&self.replacement(old));
        out.push_str(source.get(range.end..).unwrap_or(""));
        out
    }
}

impl fmt::Debug for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suggestion")
            .field("message", &self.message)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Suggestion {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.span == other.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_transforms_text() {
        let s = Suggestion::new("prefix with `:`", Span::new(5, 6), |old| format!(":{old}"));
        assert_eq!(s.replacement("a"), ":a");
        assert_eq!(s.apply("(Foo a)"), "(Foo :a)");
    }

    #[test]
    fn remove_deletes_span() {
        let s = Suggestion::remove("remove `=>`", Span::new(1, 4));
        assert_eq!(s.apply("(=> C :a)"), "( C :a)");
    }

    #[test]
    fn apply_out_of_range_is_harmless() {
        let s = Suggestion::replace_with("x", Span::new(10, 12), "y");
        assert_eq!(s.apply("abc"), "abcy");
    }
}
