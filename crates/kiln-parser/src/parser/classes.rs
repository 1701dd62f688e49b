//! Parsers for `define-class` and `define-instance`.
//!
//! Both heads share the `=>` grammar from [`super::types`]: constraints on
//! the left, the class (or instance predicate) on the right.

use kiln_common::diagnostic::Suggestion;
use kiln_common::span::Span;

use super::definitions::parse_define;
use super::types::{
    class_name, parse_context, parse_predicate_items, parse_qualified_type, split_implication,
    type_variable, ARROW,
};
use super::{ident, items_span, leading_docstring};
use crate::ast::{
    Fundep, Ident, InstanceMethodDefinition, MethodDefinition, PredicateExpr,
    ToplevelDefineClass, ToplevelDefineInstance,
};
use crate::cst::Cst;
use crate::error::ParseError;

const MISSING_CLASS_NAME: &str = "missing class name";

// ── define-class ────────────────────────────────────────────────────────

struct ClassHead {
    superclasses: Vec<PredicateExpr>,
    name: Ident,
    vars: Vec<Ident>,
    fundeps: Vec<Fundep>,
}

/// `(define-class head [docstring] (method type)*)`
pub(crate) fn parse_define_class(form: &Cst) -> Result<ToplevelDefineClass, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing define-class", span);
    let Some((head, rest)) = form.rest().split_first() else {
        return Err(note(ParseError::new("missing class head", span)));
    };
    let head_span = head.span();
    let ClassHead {
        superclasses,
        name,
        vars,
        fundeps,
    } = parse_class_head(head).map_err(note)?;

    let (docstring, methods) = leading_docstring(rest);
    let methods = methods
        .iter()
        .map(parse_method_signature)
        .collect::<Result<Vec<_>, _>>()
        .map_err(note)?;

    Ok(ToplevelDefineClass {
        name,
        vars,
        superclasses,
        fundeps,
        docstring,
        methods,
        span,
        head_span,
    })
}

fn parse_class_head(head: &Cst) -> Result<ClassHead, ParseError> {
    let Cst::List { items, span } = head else {
        return Err(ParseError::new("expected class head", head.span())
            .with_help("write `(define-class (C :a) ...)`"));
    };
    let (superclasses, right) = match split_implication(items, *span, MISSING_CLASS_NAME)? {
        Some(split) => (parse_context(split.left)?, split.right),
        None => (Vec::new(), &items[..]),
    };
    let Some((name, params)) = right.split_first() else {
        return Err(ParseError::new(MISSING_CLASS_NAME, *span));
    };
    let name = class_name(name)?;

    // Plain variables come first; the first list starts the fundeps.
    let split = params.iter().position(Cst::is_list).unwrap_or(params.len());
    let vars = params[..split]
        .iter()
        .map(type_variable)
        .collect::<Result<Vec<_>, _>>()?;
    let fundeps = params[split..]
        .iter()
        .map(parse_fundep)
        .collect::<Result<Vec<_>, _>>()?;
    if vars.is_empty() && fundeps.is_empty() {
        return Err(ParseError::new(
            format!("class `{}` has no type variables", name.name),
            *span,
        ));
    }

    Ok(ClassHead {
        superclasses,
        name,
        vars,
        fundeps,
    })
}

/// `(:a+ -> :b+)`
fn parse_fundep(cst: &Cst) -> Result<Fundep, ParseError> {
    let Cst::List { items, span } = cst else {
        return Err(ParseError::new("expected functional dependency", cst.span())
            .with_help("type variables must come before functional dependencies"));
    };
    let arrows: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_symbol(ARROW))
        .map(|(i, _)| i)
        .collect();
    let arrow = match arrows[..] {
        [arrow] => arrow,
        [] => {
            return Err(ParseError::new(
                "expected `->` in functional dependency",
                *span,
            ))
        }
        [_, second, ..] => {
            return Err(ParseError::new("unexpected `->`", items[second].span())
                .with_note("in this functional dependency", *span))
        }
    };
    let (left, right) = (&items[..arrow], &items[arrow + 1..]);
    if left.is_empty() {
        return Err(ParseError::new("missing determining variables", items[arrow].span()));
    }
    if right.is_empty() {
        return Err(ParseError::new("missing determined variables", items[arrow].span()));
    }
    let left: Vec<Ident> = left.iter().map(type_variable).collect::<Result<_, _>>()?;
    let right: Vec<Ident> = right.iter().map(type_variable).collect::<Result<_, _>>()?;
    if let Some(both) = right.iter().find(|r| left.iter().any(|l| l.name == r.name)) {
        return Err(ParseError::new(
            format!("`{}` appears on both sides of the functional dependency", both.name),
            both.span,
        )
        .with_note("in this functional dependency", *span)
        .with_suggestion(Suggestion::remove(format!("remove `{}`", both.name), both.span)));
    }
    Ok(Fundep {
        left,
        right,
        span: *span,
    })
}

/// `(name qualified-type)`
fn parse_method_signature(cst: &Cst) -> Result<MethodDefinition, ParseError> {
    match cst.items() {
        [name, ty] if cst.is_list() => Ok(MethodDefinition {
            name: ident(name)?,
            ty: parse_qualified_type(ty)?,
            span: cst.span(),
        }),
        [_, _, extra, ..] => Err(ParseError::new("unexpected trailing form", extra.span())
            .with_note("in this method signature", cst.span())),
        _ => Err(ParseError::new("expected method signature", cst.span())
            .with_help("methods are written `(name type)`")),
    }
}

// ── define-instance ─────────────────────────────────────────────────────

/// `(define-instance head [docstring] (define ...)*)`
pub(crate) fn parse_define_instance(form: &Cst) -> Result<ToplevelDefineInstance, ParseError> {
    let span = form.span();
    let note = |err: ParseError| err.with_note("when parsing define-instance", span);
    let Some((head, rest)) = form.rest().split_first() else {
        return Err(note(ParseError::new("missing instance head", span)));
    };
    let head_span = head.span();
    let (context, predicate) = parse_instance_head(head).map_err(note)?;

    let (docstring, methods) = leading_docstring(rest);
    let methods = methods
        .iter()
        .map(|method| parse_instance_method(method, span))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ToplevelDefineInstance {
        context,
        predicate,
        docstring,
        methods,
        span,
        head_span,
        compiler_generated: false,
    })
}

fn parse_instance_head(head: &Cst) -> Result<(Vec<PredicateExpr>, PredicateExpr), ParseError> {
    let Cst::List { items, span } = head else {
        return Err(ParseError::new("expected instance head", head.span())
            .with_help("write `(define-instance (C T) ...)`"));
    };
    match split_implication(items, *span, MISSING_CLASS_NAME)? {
        Some(split) => {
            let context = parse_context(split.left)?;
            let predicate = parse_predicate_items(split.right, items_span(split.right))?;
            Ok((context, predicate))
        }
        None => Ok((Vec::new(), parse_predicate_items(items, *span)?)),
    }
}

fn parse_instance_method(
    cst: &Cst,
    instance_span: Span,
) -> Result<InstanceMethodDefinition, ParseError> {
    if cst.head_symbol() != Some("define") {
        return Err(ParseError::new("expected method definition", cst.span())
            .with_note("when parsing define-instance", instance_span));
    }
    let define = parse_define(cst).map_err(|e| e.with_note("in this instance", instance_span))?;
    Ok(InstanceMethodDefinition {
        name: define.name,
        params: define.params,
        orig_params: define.orig_params,
        body: define.body,
        span: define.span,
    })
}
