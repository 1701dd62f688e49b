//! Parsers for `declare`, `define`, `define-type`, `specialize` and the
//! two attribute forms.

use kiln_common::diagnostic::Suggestion;
use kiln_common::span::Span;

use super::expressions::{parse_body, parse_pattern};
use super::types::{parse_qualified_type, parse_type, type_variable};
use super::{ident, leading_docstring};
use crate::ast::{
    AttrMonomorphize, AttrRepr, Constructor, Pattern, ReprKind, ToplevelDeclare, ToplevelDefine,
    ToplevelDefineType, ToplevelSpecialize,
};
use crate::cst::Cst;
use crate::error::ParseError;

// ── declare ─────────────────────────────────────────────────────────────

/// `(declare name qualified-type)`
pub(crate) fn parse_declare(form: &Cst) -> Result<ToplevelDeclare, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing declare", span);
    match form.rest() {
        [] => Err(note(ParseError::new("missing declared name", span))),
        [name] => {
            ident(name).map_err(note)?;
            Err(note(ParseError::new("missing declared type", span)))
        }
        [name, ty, rest @ ..] => {
            if let Some(extra) = rest.first() {
                return Err(note(
                    ParseError::new("unexpected trailing form", extra.span())
                        .with_suggestion(Suggestion::remove("remove this form", extra.span())),
                ));
            }
            Ok(ToplevelDeclare {
                name: ident(name).map_err(note)?,
                ty: parse_qualified_type(ty).map_err(note)?,
                monomorphize: None,
                span,
            })
        }
    }
}

// ── define ──────────────────────────────────────────────────────────────

/// `(define name body+)` or `(define (name pat*) [docstring] body+)`
pub(crate) fn parse_define(form: &Cst) -> Result<ToplevelDefine, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing define", span);
    let Some((head, forms)) = form.rest().split_first() else {
        return Err(note(ParseError::new("missing definition name", span)));
    };

    let (name, orig_params, params) = match head {
        Cst::List { items, span: head_span } => {
            let Some((name, pats)) = items.split_first() else {
                return Err(note(ParseError::new("missing function name", *head_span)));
            };
            let name = ident(name).map_err(note)?;
            let orig = pats
                .iter()
                .map(parse_pattern)
                .collect::<Result<Vec<_>, _>>()
                .map_err(note)?;
            let mut params = orig.clone();
            if params.is_empty() {
                params.push(Pattern::Wildcard(*head_span));
            }
            (name, orig, params)
        }
        atom => (ident(atom).map_err(note)?, Vec::new(), Vec::new()),
    };

    let (docstring, forms) = body_docstring(forms);
    let body = parse_body(forms, span, "define")?;
    Ok(ToplevelDefine {
        name,
        params,
        orig_params,
        docstring,
        body,
        monomorphize: None,
        span,
    })
}

/// A leading string is a docstring only if something follows it; a lone
/// string is the body.
pub(crate) fn body_docstring(forms: &[Cst]) -> (Option<String>, &[Cst]) {
    match forms {
        [doc, rest @ ..] if !rest.is_empty() => match doc.as_string() {
            Some(s) => (Some(s.to_string()), rest),
            None => (None, forms),
        },
        _ => (None, forms),
    }
}

// ── define-type ─────────────────────────────────────────────────────────

/// `(define-type Name [docstring] ctor*)` or
/// `(define-type (Name :a+) [docstring] ctor*)`
pub(crate) fn parse_define_type(form: &Cst) -> Result<ToplevelDefineType, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing define-type", span);
    let Some((head, rest)) = form.rest().split_first() else {
        return Err(note(ParseError::new("missing type name", span)));
    };

    let head_span = head.span();
    let (name, vars) = match head {
        Cst::List { items, .. } => match items.split_first() {
            None => return Err(note(ParseError::new("missing type name", head_span))),
            Some((name, [])) => {
                let name = ident(name).map_err(note)?;
                let fixed = name.name.clone();
                return Err(note(
                    ParseError::new("nullary type with parentheses", head_span)
                        .with_help("types without parameters are written without parentheses")
                        .with_suggestion(Suggestion::replace_with(
                            "remove the parentheses",
                            head_span,
                            fixed,
                        )),
                ));
            }
            Some((name, vars)) => {
                let name = ident(name).map_err(note)?;
                let vars = vars
                    .iter()
                    .map(type_variable)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(note)?;
                (name, vars)
            }
        },
        atom => (ident(atom).map_err(note)?, Vec::new()),
    };

    let (docstring, ctors) = leading_docstring(rest);
    let constructors = ctors
        .iter()
        .map(parse_constructor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(note)?;

    Ok(ToplevelDefineType {
        name,
        vars,
        docstring,
        constructors,
        repr: None,
        span,
        head_span,
    })
}

/// `Name` or `(Name field-type*)`
fn parse_constructor(cst: &Cst) -> Result<Constructor, ParseError> {
    let invalid = || {
        ParseError::new("invalid constructor", cst.span())
            .with_help("constructors are written `Name` or `(Name field-type ...)`")
    };
    match cst {
        Cst::Atom { span, .. } => Ok(Constructor {
            name: ident(cst).map_err(|_| invalid())?,
            fields: Vec::new(),
            span: *span,
        }),
        Cst::List { items, span } => {
            let (name, fields) = items.split_first().ok_or_else(invalid)?;
            let name = ident(name).map_err(|_| invalid())?;
            let fields = fields.iter().map(parse_type).collect::<Result<Vec<_>, _>>()?;
            Ok(Constructor {
                name,
                fields,
                span: *span,
            })
        }
    }
}

// ── specialize ──────────────────────────────────────────────────────────

/// `(specialize from to type)`
pub(crate) fn parse_specialize(form: &Cst) -> Result<ToplevelSpecialize, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing specialize", span);
    match form.rest() {
        [] => Err(note(ParseError::new("missing from name", span))),
        [_] => Err(note(ParseError::new("missing to name", span))),
        [_, _] => Err(note(ParseError::new("missing type", span))),
        [from, to, ty] => Ok(ToplevelSpecialize {
            from: ident(from).map_err(note)?,
            to: ident(to).map_err(note)?,
            ty: parse_type(ty).map_err(note)?,
            span,
        }),
        [_, _, _, extra, ..] => Err(note(
            ParseError::new("unexpected form", extra.span())
                .with_suggestion(Suggestion::remove("remove this form", extra.span())),
        )),
    }
}

// ── Attributes ──────────────────────────────────────────────────────────

/// `(monomorphize)`
pub(crate) fn parse_monomorphize(form: &Cst) -> Result<AttrMonomorphize, ParseError> {
    if let Some(extra) = form.rest().first() {
        return Err(ParseError::new("unexpected trailing form", extra.span())
            .with_note("`monomorphize` takes no arguments", form.span()));
    }
    Ok(AttrMonomorphize { span: form.span() })
}

/// `(repr :enum)`, `(repr :lisp)`, `(repr :transparent)` or
/// `(repr :native host-type)`.
pub(crate) fn parse_repr(form: &Cst) -> Result<AttrRepr, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing repr", span);
    let Some((kind, args)) = form.rest().split_first() else {
        return Err(note(ParseError::new("missing repr kind", span)));
    };

    let kind = match kind.as_keyword() {
        Some(":enum") => ReprKind::Enum,
        Some(":lisp") => ReprKind::Lisp,
        Some(":transparent") => ReprKind::Transparent,
        Some(":native") => {
            return match args {
                [] => Err(note(
                    ParseError::new("missing native type", span)
                        .with_help("write `(repr :native <host-type>)`"),
                )),
                [host] => Ok(AttrRepr {
                    kind: ReprKind::Native(host.clone()),
                    span,
                }),
                [_, extra, ..] => Err(note(trailing(extra.span()))),
            };
        }
        _ => {
            return Err(note(
                ParseError::new(format!("unknown repr kind `{kind}`"), kind.span())
                    .with_help("expected one of `:enum`, `:lisp`, `:transparent` or `:native`"),
            ))
        }
    };
    if let Some(extra) = args.first() {
        return Err(note(trailing(extra.span())));
    }
    Ok(AttrRepr { kind, span })
}

fn trailing(span: Span) -> ParseError {
    ParseError::new("unexpected trailing form", span)
        .with_suggestion(Suggestion::remove("remove this form", span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    fn form(src: &str) -> Cst {
        read(src).unwrap().remove(0)
    }

    #[test]
    fn declare_arity() {
        assert_eq!(parse_declare(&form("(declare f)")).unwrap_err().message, "missing declared type");
        let err = parse_declare(&form("(declare f Integer String)")).unwrap_err();
        assert_eq!(err.message, "unexpected trailing form");
        assert_eq!(err.notes[0].message, "when parsing declare");
    }

    #[test]
    fn define_value_and_function() {
        let value = parse_define(&form("(define x 1)")).unwrap();
        assert!(!value.is_function());

        let nullary = parse_define(&form("(define (f) 1)")).unwrap();
        assert!(nullary.orig_params.is_empty());
        assert!(matches!(nullary.params[..], [Pattern::Wildcard(_)]));
    }

    #[test]
    fn define_strips_docstring_only_before_body() {
        let f = parse_define(&form(r#"(define (f x) "doc" x)"#)).unwrap();
        assert_eq!(f.docstring.as_deref(), Some("doc"));
        assert_eq!(f.body.exprs.len(), 1);

        let s = parse_define(&form(r#"(define s "value")"#)).unwrap();
        assert_eq!(s.docstring, None);
    }

    #[test]
    fn define_type_head_errors() {
        let src = "(define-type (Foo) Bar)";
        let err = parse_define_type(&form(src)).unwrap_err();
        assert_eq!(err.message, "nullary type with parentheses");
        assert_eq!(err.suggestions[0].apply(src), "(define-type Foo Bar)");

        let src = "(define-type (Box a) (Box a))";
        let err = parse_define_type(&form(src)).unwrap_err();
        assert_eq!(err.message, "expected a type variable");
        assert_eq!(err.suggestions[0].apply(src), "(define-type (Box :a) (Box a))");
    }

    #[test]
    fn define_type_constructors() {
        let ty = parse_define_type(&form(r#"(define-type (Maybe :a) "doc" (Just :a) Nothing)"#))
            .unwrap();
        assert_eq!(ty.vars.len(), 1);
        assert_eq!(ty.docstring.as_deref(), Some("doc"));
        assert_eq!(ty.constructors[0].fields.len(), 1);
        assert!(ty.constructors[1].fields.is_empty());
    }

    #[test]
    fn repr_grammar() {
        assert_eq!(parse_repr(&form("(repr :enum)")).unwrap().kind, ReprKind::Enum);
        assert_eq!(parse_repr(&form("(repr :native)")).unwrap_err().message, "missing native type");
        assert_eq!(
            parse_repr(&form("(repr :enum x)")).unwrap_err().message,
            "unexpected trailing form"
        );
        let native = parse_repr(&form("(repr :native (Vec i64))")).unwrap();
        assert!(matches!(native.kind, ReprKind::Native(ref t) if t.to_string() == "(Vec i64)"));
    }

    #[test]
    fn specialize_arity() {
        let msg = |src| parse_specialize(&form(src)).unwrap_err().message;
        assert_eq!(msg("(specialize f)"), "missing to name");
        assert_eq!(msg("(specialize f g)"), "missing type");
        assert_eq!(msg("(specialize f g Integer x)"), "unexpected form");
        let s = parse_specialize(&form("(specialize f g (Integer -> Integer))")).unwrap();
        assert_eq!(s.to.name, "g");
    }
}
