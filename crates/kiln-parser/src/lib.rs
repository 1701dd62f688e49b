//! Kiln parser: reader, CST adapter and toplevel parser.
//!
//! Source text goes through three stages:
//!
//! 1. the lexer and [`reader`] build a lossless rowan tree ([`read_tree`]),
//! 2. the tree is lowered into owned [`Cst`] forms ([`read`]),
//! 3. the [`ToplevelParser`] turns forms into a [`Program`]
//!    ([`parse_program`]).
//!
//! Every stage reports problems as structured [`ParseError`] values.

pub mod ast;
pub mod cst;
pub mod error;
pub mod macros;
mod parser;
mod reader;
pub mod syntax;
pub mod syntax_kind;

use kiln_lexer::Lexer;

pub use ast::Program;
pub use cst::{Atom, Cst};
pub use error::ParseError;
pub use macros::{MacroExpander, MacroTable, NoMacros, MAX_EXPANSION_DEPTH};
pub use parser::ToplevelParser;
pub use syntax::{debug_tree, SyntaxElement, SyntaxNode, SyntaxToken};
pub use syntax_kind::SyntaxKind;

/// Package name used when the caller does not supply one.
pub const DEFAULT_PACKAGE: &str = "user";

/// Result of reading a Kiln source file.
///
/// Contains the green tree (the immutable, cheap-to-clone CST) and any
/// lexer or reader errors. With the first-error-only strategy, `errors`
/// holds at most one error.
pub struct Parse {
    green: rowan::GreenNode,
    errors: Vec<ParseError>,
}

impl Parse {
    /// Build the syntax tree root from the green node.
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Whether reading completed without errors.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Lex and read `source` into a lossless syntax tree.
pub fn read_tree(source: &str) -> Parse {
    let (tokens, lex_errors) = Lexer::tokenize(source);
    let (green, read_errors) = reader::Reader::new(tokens, source).read_root();
    // A lexer error usually explains any reader error that follows it.
    let errors = match lex_errors.into_iter().next() {
        Some(err) => vec![ParseError::from(err)],
        None => read_errors,
    };
    Parse { green, errors }
}

/// Read `source` into owned toplevel forms.
pub fn read(source: &str) -> Result<Vec<Cst>, ParseError> {
    let parse = read_tree(source);
    if let Some(err) = parse.errors.into_iter().next() {
        return Err(err);
    }
    Ok(cst::lower_root(&SyntaxNode::new_root(parse.green)))
}

/// Parse a whole source file with no macros and the default package.
pub fn parse_program(source: &str, file: &str) -> Result<Program, ParseError> {
    parse_program_with(source, file, DEFAULT_PACKAGE, &NoMacros)
}

/// Parse a whole source file.
pub fn parse_program_with(
    source: &str,
    file: &str,
    package: &str,
    macros: &dyn MacroExpander,
) -> Result<Program, ParseError> {
    let forms = read(source)?;
    parse_forms(&forms, Program::new(package, file), macros)
}

/// Feed already-read forms through a [`ToplevelParser`], starting from
/// `program`.
pub fn parse_forms(
    forms: &[Cst],
    program: Program,
    macros: &dyn MacroExpander,
) -> Result<Program, ParseError> {
    let mut parser = ToplevelParser::new(program, macros);
    for form in forms {
        parser.parse_form(form)?;
    }
    let program = parser.finish()?;
    tracing::debug!(
        file = %program.file,
        types = program.types.len(),
        declares = program.declares.len(),
        defines = program.defines.len(),
        classes = program.classes.len(),
        instances = program.instances.len(),
        specializations = program.specializations.len(),
        "parsed program"
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tree_is_lossless() {
        let source = "(define x 1) ; comment\n(define y \"s\")";
        let parse = read_tree(source);
        assert!(parse.ok());
        assert_eq!(parse.syntax().text().to_string(), source);
    }

    #[test]
    fn unbalanced_input() {
        let err = read("(define x").unwrap_err();
        assert_eq!(err.message, "unclosed list");
        assert_eq!(err.notes[0].message, "list opened here");

        let err = read("x)").unwrap_err();
        assert_eq!(err.message, "unexpected `)`");
    }

    #[test]
    fn lexer_errors_surface_first() {
        let err = read("(define s \"abc").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn atoms_at_toplevel_are_invalid() {
        let err = parse_program("42", "test.kiln").unwrap_err();
        assert_eq!(err.message, "invalid toplevel form");
    }
}
