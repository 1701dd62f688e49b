// Kiln lexer -- tokenizer for the parenthesized surface syntax.

mod cursor;

use cursor::Cursor;
use kiln_common::error::{LexError, LexErrorKind};
use kiln_common::span::Span;
use kiln_common::token::{Token, TokenKind};

/// The Kiln lexer. Converts source text into a stream of tokens.
///
/// Trivia tokens (whitespace, comments) are produced too, so the reader
/// can build a lossless tree. Problems are recorded in [`Lexer::errors`]
/// while lexing continues.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    source: &'src str,
    emitted_eof: bool,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            source,
            emitted_eof: false,
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source. The token vector ends with `Eof`.
    pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.by_ref().collect();
        (tokens, lexer.errors)
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn next_token(&mut self) -> Token {
        let start = self.cursor.pos();
        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            ';' => {
                self.cursor.eat_while(|c| c != '\n');
                Token::new(TokenKind::Comment, start, self.cursor.pos())
            }
            '"' => self.lex_string(start),
            c if c.is_whitespace() => {
                self.cursor.eat_while(char::is_whitespace);
                Token::new(TokenKind::Whitespace, start, self.cursor.pos())
            }
            _ => self.lex_atom(start),
        }
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    /// Lex a string literal. The token covers both quotes.
    fn lex_string(&mut self, start: u32) -> Token {
        self.cursor.advance(); // opening quote
        loop {
            match self.cursor.advance() {
                None => {
                    let span = Span::new(start, self.cursor.pos());
                    self.errors
                        .push(LexError::new(LexErrorKind::UnterminatedString, span));
                    return Token::new(TokenKind::Error, start, self.cursor.pos());
                }
                Some('"') => return Token::new(TokenKind::String, start, self.cursor.pos()),
                Some('\\') => {
                    let escape_start = self.cursor.pos() - 1;
                    match self.cursor.advance() {
                        Some('"' | '\\' | 'n' | 't') => {}
                        Some(other) => self.errors.push(LexError::new(
                            LexErrorKind::InvalidEscapeSequence(other),
                            Span::new(escape_start, self.cursor.pos()),
                        )),
                        None => {}
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Lex a symbol or a number: a maximal run of non-delimiter characters.
    fn lex_atom(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_atom_char);
        let end = self.cursor.pos();
        let text = &self.source[start as usize..end as usize];

        if !looks_numeric(text) {
            return Token::new(TokenKind::Symbol, start, end);
        }
        if text.parse::<i64>().is_ok() {
            Token::new(TokenKind::Integer, start, end)
        } else if text.parse::<f64>().is_ok() {
            Token::new(TokenKind::Float, start, end)
        } else {
            self.errors.push(LexError::new(
                LexErrorKind::InvalidNumberLiteral(text.to_string()),
                Span::new(start, end),
            ));
            Token::new(TokenKind::Error, start, end)
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_atom_char(c: char) -> bool {
    !(c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';'))
}

/// A run is numeric if it starts with a digit, or with a sign followed by
/// a digit. `-`, `->` and `+` stay symbols.
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Decode the contents of a string literal token (quotes included).
///
/// Invalid escapes were already reported by the lexer and are kept
/// verbatim here.
pub fn unescape_string(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .map(|s| s.strip_suffix('"').unwrap_or(s))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other @ ('"' | '\\')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .0
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn arrows_are_symbols() {
        assert_eq!(
            kinds("(-> => - +)"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 -2 3.5 1+"),
            vec![
                TokenKind::Integer,
                TokenKind::Integer,
                TokenKind::Float,
                TokenKind::Error,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, errors) = Lexer::tokenize("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
        assert_eq!(errors[0].span, Span::new(0, 4));
    }

    #[test]
    fn unescape() {
        assert_eq!(unescape_string(r#""a\"b\\c\n""#), "a\"b\\c\n");
        assert_eq!(unescape_string(r#""\q""#), "\\q");
    }
}
