//! The owned concrete syntax tree handed to the toplevel parser.
//!
//! A [`Cst`] is either an atom or a list, and every node carries the span
//! it came from. It is lowered from the lossless rowan tree built by the
//! reader, and it is also the currency of macro expansion: expanders
//! receive a `Cst` and return a new one.

use std::fmt;

use kiln_common::span::Span;
use kiln_lexer::unescape_string;

use crate::syntax::SyntaxNode;
use crate::syntax_kind::SyntaxKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Symbol(String),
    Integer(i64),
    Float(f64),
    /// Decoded string contents (escapes resolved, quotes removed).
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cst {
    Atom { atom: Atom, span: Span },
    List { items: Vec<Cst>, span: Span },
}

impl Cst {
    pub fn symbol(name: impl Into<String>, span: Span) -> Cst {
        Cst::Atom {
            atom: Atom::Symbol(name.into()),
            span,
        }
    }

    pub fn list(items: Vec<Cst>, span: Span) -> Cst {
        Cst::List { items, span }
    }

    pub fn span(&self) -> Span {
        match self {
            Cst::Atom { span, .. } | Cst::List { span, .. } => *span,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Cst::List { .. })
    }

    /// The atom's value, if this is an atom.
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Cst::Atom { atom, .. } => Some(atom),
            Cst::List { .. } => None,
        }
    }

    /// The children of a list. Atoms have no children.
    pub fn items(&self) -> &[Cst] {
        match self {
            Cst::List { items, .. } => items,
            Cst::Atom { .. } => &[],
        }
    }

    /// First element of a list.
    pub fn first(&self) -> Option<&Cst> {
        self.items().first()
    }

    /// Everything after the first element of a list.
    pub fn rest(&self) -> &[Cst] {
        self.items().get(1..).unwrap_or(&[])
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Cst::Atom {
                atom: Atom::Symbol(s),
                ..
            } => Some(s),
            _ => None,
        }
    }

    /// Keyword symbols start with `:` and name type variables and repr kinds.
    pub fn as_keyword(&self) -> Option<&str> {
        self.as_symbol().filter(|s| is_keyword(s))
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Cst::Atom {
                atom: Atom::String(s),
                ..
            } => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    /// The leading symbol of a list form, e.g. `define` in `(define x 1)`.
    pub fn head_symbol(&self) -> Option<&str> {
        self.first().and_then(Cst::as_symbol)
    }
}

pub fn is_keyword(symbol: &str) -> bool {
    symbol.len() > 1 && symbol.starts_with(':')
}

impl fmt::Display for Cst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cst::Atom { atom, .. } => match atom {
                Atom::Symbol(s) => write!(f, "{s}"),
                Atom::Integer(n) => write!(f, "{n}"),
                Atom::Float(x) => write!(f, "{x:?}"),
                Atom::String(s) => write!(f, "{s:?}"),
            },
            Cst::List { items, .. } => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Lower the children of a `ROOT` node into owned forms.
///
/// Error nodes are skipped; the reader has already reported them.
pub fn lower_root(root: &SyntaxNode) -> Vec<Cst> {
    root.children().filter_map(|node| lower_node(&node)).collect()
}

fn lower_node(node: &SyntaxNode) -> Option<Cst> {
    let range = node.text_range();
    let span = Span::new(range.start().into(), range.end().into());
    match node.kind() {
        SyntaxKind::LIST => {
            let items = node.children().filter_map(|n| lower_node(&n)).collect();
            Some(Cst::List { items, span })
        }
        SyntaxKind::ATOM => {
            let token = node
                .children_with_tokens()
                .filter_map(|e| e.into_token())
                .find(|t| !t.kind().is_trivia())?;
            let text = token.text();
            let atom = match token.kind() {
                SyntaxKind::SYMBOL => Atom::Symbol(text.to_string()),
                SyntaxKind::INTEGER => Atom::Integer(text.parse().ok()?),
                SyntaxKind::FLOAT => Atom::Float(text.parse().ok()?),
                SyntaxKind::STRING => Atom::String(unescape_string(text)),
                _ => return None,
            };
            Some(Cst::Atom { atom, span })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, start: u32) -> Cst {
        Cst::symbol(name, Span::new(start, start + name.len() as u32))
    }

    #[test]
    fn first_and_rest() {
        let form = Cst::list(vec![sym("define", 1), sym("x", 8)], Span::new(0, 10));
        assert_eq!(form.head_symbol(), Some("define"));
        assert_eq!(form.rest().len(), 1);
        assert!(form.rest()[0].is_symbol("x"));
        assert!(sym("x", 0).rest().is_empty());
    }

    #[test]
    fn keywords() {
        assert_eq!(sym(":a", 0).as_keyword(), Some(":a"));
        assert_eq!(sym("a", 0).as_keyword(), None);
        assert_eq!(sym(":", 0).as_keyword(), None);
    }

    #[test]
    fn display_round_trips_shape() {
        let form = Cst::list(
            vec![
                sym("f", 1),
                Cst::Atom {
                    atom: Atom::String("a\"b".into()),
                    span: Span::new(3, 9),
                },
                Cst::list(vec![], Span::new(10, 12)),
            ],
            Span::new(0, 13),
        );
        assert_eq!(form.to_string(), r#"(f "a\"b" ())"#);
    }
}
