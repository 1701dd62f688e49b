//! SyntaxKind enum for the Kiln CST.
//!
//! Token kinds are mapped 1:1 from [`TokenKind`]; node kinds are the three
//! shapes the reader produces.

use kiln_common::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    /// Wrapper for tokens that could not be read.
    ERROR_NODE = 0,

    // ── Tokens ─────────────────────────────────────────────────────────
    L_PAREN,
    R_PAREN,
    SYMBOL,
    INTEGER,
    FLOAT,
    STRING,
    COMMENT,
    WHITESPACE,
    ERROR,
    EOF,

    // ── Nodes ──────────────────────────────────────────────────────────
    /// The whole source file.
    ROOT,
    /// A parenthesized list.
    LIST,
    /// A single symbol or literal, wrapping exactly one token.
    ATOM,
}

impl SyntaxKind {
    const ALL: [SyntaxKind; 14] = [
        SyntaxKind::ERROR_NODE,
        SyntaxKind::L_PAREN,
        SyntaxKind::R_PAREN,
        SyntaxKind::SYMBOL,
        SyntaxKind::INTEGER,
        SyntaxKind::FLOAT,
        SyntaxKind::STRING,
        SyntaxKind::COMMENT,
        SyntaxKind::WHITESPACE,
        SyntaxKind::ERROR,
        SyntaxKind::EOF,
        SyntaxKind::ROOT,
        SyntaxKind::LIST,
        SyntaxKind::ATOM,
    ];

    /// Recover a kind from its raw discriminant. Unknown values map to
    /// `ERROR_NODE`.
    pub fn from_raw(raw: u16) -> SyntaxKind {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(SyntaxKind::ERROR_NODE)
    }

    pub fn is_trivia(self) -> bool {
        matches!(self, SyntaxKind::WHITESPACE | SyntaxKind::COMMENT)
    }
}

impl From<TokenKind> for SyntaxKind {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::LParen => SyntaxKind::L_PAREN,
            TokenKind::RParen => SyntaxKind::R_PAREN,
            TokenKind::Symbol => SyntaxKind::SYMBOL,
            TokenKind::Integer => SyntaxKind::INTEGER,
            TokenKind::Float => SyntaxKind::FLOAT,
            TokenKind::String => SyntaxKind::STRING,
            TokenKind::Comment => SyntaxKind::COMMENT,
            TokenKind::Whitespace => SyntaxKind::WHITESPACE,
            TokenKind::Error => SyntaxKind::ERROR,
            TokenKind::Eof => SyntaxKind::EOF,
        }
    }
}
