use serde::Serialize;

use crate::span::Span;

/// A token produced by the Kiln lexer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind and byte offsets.
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every kind of token in the parenthesized surface syntax.
///
/// The syntax has no keywords at the lexical level: `define`, `=>` and
/// `->` are ordinary symbols, and the parser gives them meaning by
/// position. Trivia (whitespace and comments) is kept so the reader can
/// build a lossless tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    LParen,
    RParen,
    /// Any run of non-delimiter, non-whitespace characters that is not a
    /// number. Symbols beginning with `:` are keyword symbols.
    Symbol,
    Integer,
    Float,
    /// A double-quoted string literal, quotes included.
    String,
    /// `;` to end of line.
    Comment,
    Whitespace,
    /// An unterminated string or other unlexable input.
    Error,
    Eof,
}

impl TokenKind {
    /// Whether the token carries no meaning for the parser.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::Whitespace)
    }
}
