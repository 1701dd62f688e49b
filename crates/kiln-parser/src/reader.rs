//! The reader: tokens to a lossless rowan tree.
//!
//! The reader wraps every atom in an `ATOM` node and every parenthesized
//! group in a `LIST` node, keeping whitespace and comments as tokens so
//! the tree reproduces the source exactly. It stops recording errors
//! after the first one (first-error-only), but always consumes the whole
//! token stream so the tree stays lossless.

use kiln_common::span::Span;
use kiln_common::token::{Token, TokenKind};
use rowan::GreenNodeBuilder;

use crate::error::ParseError;
use crate::syntax_kind::SyntaxKind;

pub(crate) struct Reader<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<ParseError>,
}

impl<'src> Reader<'src> {
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    /// Read the whole token stream into a `ROOT` node.
    pub(crate) fn read_root(mut self) -> (rowan::GreenNode, Vec<ParseError>) {
        self.builder.start_node(SyntaxKind::ROOT.into());
        loop {
            match self.current() {
                TokenKind::Eof => break,
                TokenKind::RParen => {
                    let span = self.current_span();
                    self.error(ParseError::new("unexpected `)`", span));
                    self.builder.start_node(SyntaxKind::ERROR_NODE.into());
                    self.bump();
                    self.builder.finish_node();
                }
                kind if kind.is_trivia() => self.bump(),
                _ => self.read_form(),
            }
        }
        self.builder.finish_node();
        (self.builder.finish(), self.errors)
    }

    fn read_form(&mut self) {
        match self.current() {
            TokenKind::LParen => self.read_list(),
            TokenKind::Error => {
                self.builder.start_node(SyntaxKind::ERROR_NODE.into());
                self.bump();
                self.builder.finish_node();
            }
            _ => {
                self.builder.start_node(SyntaxKind::ATOM.into());
                self.bump();
                self.builder.finish_node();
            }
        }
    }

    fn read_list(&mut self) {
        let open = self.current_span();
        self.builder.start_node(SyntaxKind::LIST.into());
        self.bump(); // (
        loop {
            match self.current() {
                TokenKind::RParen => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let end = self.current_span();
                    self.error(
                        ParseError::new("unclosed list", Span::new(open.start, end.end))
                            .with_note("list opened here", open),
                    );
                    break;
                }
                kind if kind.is_trivia() => self.bump(),
                _ => self.read_form(),
            }
        }
        self.builder.finish_node();
    }

    fn current(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map(|t| t.span).unwrap_or_else(|| {
            let end = self.source.len() as u32;
            Span::point(end)
        })
    }

    /// Push the current token into the tree and advance. `Eof` is never
    /// pushed.
    fn bump(&mut self) {
        let Some(token) = self.tokens.get(self.pos) else {
            return;
        };
        if token.kind != TokenKind::Eof {
            let text = &self.source[token.span.range()];
            self.builder.token(SyntaxKind::from(token.kind).into(), text);
        }
        self.pos += 1;
    }

    fn error(&mut self, err: ParseError) {
        if self.errors.is_empty() {
            self.errors.push(err);
        }
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        rowan::SyntaxKind(kind as u16)
    }
}
