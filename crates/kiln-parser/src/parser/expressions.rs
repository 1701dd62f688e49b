//! Expression, pattern and body sub-parsers.

use kiln_common::span::Span;

use super::types::parse_type;
use super::{ident, items_span};
use crate::ast::{Body, Expr, Ident, Literal, MatchArm, Pattern};
use crate::cst::{is_keyword, Atom, Cst};
use crate::error::ParseError;

/// Symbols with special meaning in head position.
const SPECIAL_FORMS: &[&str] = &["fn", "let", "if", "match", "progn", "the"];

pub(crate) fn parse_expr(cst: &Cst) -> Result<Expr, ParseError> {
    match cst {
        Cst::Atom { atom, span } => match atom {
            Atom::Integer(n) => Ok(Expr::Literal(Literal::Integer(*n), *span)),
            Atom::Float(x) => Ok(Expr::Literal(Literal::Float(*x), *span)),
            Atom::String(s) => Ok(Expr::Literal(Literal::String(s.clone()), *span)),
            Atom::Symbol(name) if is_keyword(name) => Err(ParseError::new(
                format!("unexpected keyword `{name}` in expression"),
                *span,
            )),
            Atom::Symbol(name) if SPECIAL_FORMS.contains(&name.as_str()) => Err(
                ParseError::new(format!("`{name}` must appear at the head of a form"), *span),
            ),
            Atom::Symbol(name) => Ok(Expr::Var(Ident::new(name.as_str(), *span))),
        },
        Cst::List { items, span } => parse_list_expr(items, *span),
    }
}

fn parse_list_expr(items: &[Cst], span: Span) -> Result<Expr, ParseError> {
    let Some(head) = items.first() else {
        return Err(ParseError::new("empty form in expression position", span)
            .with_help("write `Unit` for the unit value"));
    };
    let rest = &items[1..];
    match head.as_symbol() {
        Some("fn") => parse_lambda(rest, span),
        Some("let") => parse_let(rest, span),
        Some("if") => parse_if(rest, span),
        Some("match") => parse_match(rest, span),
        Some("progn") => Ok(Expr::Progn(parse_body(rest, span, "progn")?)),
        Some("the") => parse_the(rest, span),
        _ => {
            let func = parse_expr(head)?;
            let args = rest.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::App {
                func: Box::new(func),
                args,
                span,
            })
        }
    }
}

/// `(fn (pat*) body+)`
fn parse_lambda(rest: &[Cst], span: Span) -> Result<Expr, ParseError> {
    let Some(Cst::List {
        items: params,
        span: params_span,
    }) = rest.first()
    else {
        return Err(ParseError::new("expected parameter list", span)
            .with_help("write `(fn (x y) body)`"));
    };
    let mut params = params.iter().map(parse_pattern).collect::<Result<Vec<_>, _>>()?;
    if params.is_empty() {
        params.push(Pattern::Wildcard(*params_span));
    }
    let body = parse_body(&rest[1..], span, "fn")?;
    Ok(Expr::Lambda { params, body, span })
}

/// `(let ((name expr)+) body+)`
fn parse_let(rest: &[Cst], span: Span) -> Result<Expr, ParseError> {
    let Some(Cst::List {
        items: bindings,
        span: bindings_span,
    }) = rest.first()
    else {
        return Err(ParseError::new("expected binding list", span)
            .with_help("write `(let ((x 1)) body)`"));
    };
    if bindings.is_empty() {
        return Err(ParseError::new("empty binding list", *bindings_span));
    }
    let bindings = bindings
        .iter()
        .map(|binding| match binding.items() {
            [name, value] if binding.is_list() => Ok((ident(name)?, parse_expr(value)?)),
            _ => Err(ParseError::new("malformed binding", binding.span())
                .with_help("each binding is `(name expr)`")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let body = parse_body(&rest[1..], span, "let")?;
    Ok(Expr::Let {
        bindings,
        body,
        span,
    })
}

/// `(if c t e)`
fn parse_if(rest: &[Cst], span: Span) -> Result<Expr, ParseError> {
    match rest {
        [cond, then_branch, else_branch] => Ok(Expr::If {
            cond: Box::new(parse_expr(cond)?),
            then_branch: Box::new(parse_expr(then_branch)?),
            else_branch: Box::new(parse_expr(else_branch)?),
            span,
        }),
        [_, _, _, extra, ..] => Err(ParseError::new("unexpected trailing form", extra.span())
            .with_note("when parsing if", span)),
        _ => Err(ParseError::new(
            "`if` requires a condition and two branches",
            span,
        )),
    }
}

/// `(match e (pat body+)+)`
fn parse_match(rest: &[Cst], span: Span) -> Result<Expr, ParseError> {
    let Some((scrutinee, arms)) = rest.split_first() else {
        return Err(ParseError::new("missing match scrutinee", span));
    };
    let scrutinee = parse_expr(scrutinee)?;
    if arms.is_empty() {
        return Err(ParseError::new("match requires at least one arm", span));
    }
    let arms = arms
        .iter()
        .map(|arm| {
            let Cst::List { items, span: arm_span } = arm else {
                return Err(ParseError::new("expected match arm", arm.span())
                    .with_help("each arm is `(pattern body)`"));
            };
            let (pattern, body) = items
                .split_first()
                .ok_or_else(|| ParseError::new("empty match arm", *arm_span))?;
            Ok(MatchArm {
                pattern: parse_pattern(pattern)?,
                body: parse_body(body, *arm_span, "match arm")?,
                span: *arm_span,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::Match {
        scrutinee: Box::new(scrutinee),
        arms,
        span,
    })
}

/// `(the type expr)`
fn parse_the(rest: &[Cst], span: Span) -> Result<Expr, ParseError> {
    match rest {
        [ty, expr] => Ok(Expr::The {
            ty: parse_type(ty)?,
            expr: Box::new(parse_expr(expr)?),
            span,
        }),
        [_, _, extra, ..] => Err(ParseError::new("unexpected trailing form", extra.span())
            .with_note("when parsing the", span)),
        _ => Err(ParseError::new("`the` requires a type and an expression", span)),
    }
}

/// Parse a non-empty sequence of expressions. `owner` names the enclosing
/// form for the error message.
pub(crate) fn parse_body(forms: &[Cst], owner_span: Span, owner: &str) -> Result<Body, ParseError> {
    if forms.is_empty() {
        return Err(ParseError::new("missing body", owner_span)
            .with_note(format!("when parsing {owner}"), owner_span));
    }
    let exprs = forms.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?;
    Ok(Body {
        exprs,
        span: items_span(forms),
    })
}

/// Patterns:
///
/// - `_` matches anything
/// - a lowercase symbol binds a variable
/// - a capitalized symbol is a nullary constructor
/// - `(Ctor pat*)` is a constructor pattern
/// - integer and string literals match by equality
pub(crate) fn parse_pattern(cst: &Cst) -> Result<Pattern, ParseError> {
    match cst {
        Cst::Atom { atom, span } => match atom {
            Atom::Integer(n) => Ok(Pattern::Literal(Literal::Integer(*n), *span)),
            Atom::String(s) => Ok(Pattern::Literal(Literal::String(s.clone()), *span)),
            Atom::Float(_) => Err(ParseError::new(
                "float literals cannot be used as patterns",
                *span,
            )),
            Atom::Symbol(name) if name == "_" => Ok(Pattern::Wildcard(*span)),
            Atom::Symbol(name) if is_constructor_name(name) => Ok(Pattern::Constructor {
                name: Ident::new(name.as_str(), *span),
                patterns: Vec::new(),
                span: *span,
            }),
            Atom::Symbol(_) => Ok(Pattern::Var(ident(cst)?)),
        },
        Cst::List { items, span } => {
            let Some((head, args)) = items.split_first() else {
                return Err(ParseError::new("empty pattern", *span));
            };
            let name = ident(head).map_err(|_| {
                ParseError::new("expected constructor name", head.span())
                    .with_note("in this pattern", *span)
            })?;
            let patterns = args.iter().map(parse_pattern).collect::<Result<Vec<_>, _>>()?;
            Ok(Pattern::Constructor {
                name,
                patterns,
                span: *span,
            })
        }
    }
}

fn is_constructor_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    fn expr(src: &str) -> Result<Expr, ParseError> {
        parse_expr(&read(src).unwrap()[0])
    }

    #[test]
    fn application_and_literals() {
        let Expr::App { func, args, .. } = expr("(f 1 2.5 \"s\")").unwrap() else {
            panic!("expected application");
        };
        assert!(matches!(*func, Expr::Var(ref id) if id.name == "f"));
        assert!(matches!(args[0], Expr::Literal(Literal::Integer(1), _)));
        assert!(matches!(args[1], Expr::Literal(Literal::Float(_), _)));
        assert!(matches!(args[2], Expr::Literal(Literal::String(ref s), _) if s == "s"));
    }

    #[test]
    fn nullary_call_keeps_empty_args() {
        let Expr::App { args, .. } = expr("(f)").unwrap() else {
            panic!("expected application");
        };
        assert!(args.is_empty());
    }

    #[test]
    fn lambda_without_params_gets_wildcard() {
        let Expr::Lambda { params, .. } = expr("(fn () 1)").unwrap() else {
            panic!("expected lambda");
        };
        assert_eq!(params.len(), 1);
        assert!(matches!(params[0], Pattern::Wildcard(_)));
    }

    #[test]
    fn let_bindings_are_ordered() {
        let Expr::Let { bindings, body, .. } = expr("(let ((x 1) (y x)) y)").unwrap() else {
            panic!("expected let");
        };
        let names: Vec<_> = bindings.iter().map(|(n, _)| n.name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(body.exprs.len(), 1);
    }

    #[test]
    fn match_arms_and_patterns() {
        let Expr::Match { arms, .. } = expr("(match xs ((Cons x _) x) (Nil 0))").unwrap() else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 2);
        let names: Vec<_> = arms[0]
            .pattern
            .bound_names()
            .into_iter()
            .map(|id| id.name.as_str())
            .collect();
        assert_eq!(names, ["x"]);
        assert!(matches!(arms[1].pattern, Pattern::Constructor { ref patterns, .. } if patterns.is_empty()));
    }

    #[test]
    fn malformed_forms() {
        assert_eq!(expr("(if c t)").unwrap_err().message, "`if` requires a condition and two branches");
        assert_eq!(expr("(fn (x))").unwrap_err().message, "missing body");
        assert_eq!(expr("()").unwrap_err().message, "empty form in expression position");
        assert_eq!(expr("(f :a)").unwrap_err().message, "unexpected keyword `:a` in expression");
    }
}
