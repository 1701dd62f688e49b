//! Type, predicate and qualified-type sub-parsers.
//!
//! Grammar:
//!
//! ```text
//! type      := :var | Name | (type) | (type type+) | (type+ -> type+ [-> type+]*)
//! predicate := (Class type+)
//! context   := predicate | Class type+        -- left of `=>`
//! qualified := type | (context => type+) | ((predicate) (predicate)+ => type+)
//! ```
//!
//! The `=>` placement rules are shared with class and instance heads.

use kiln_common::diagnostic::Suggestion;
use kiln_common::span::Span;

use super::{ident, items_span};
use crate::ast::{Ident, PredicateExpr, QualifiedTypeExpr, TypeExpr};
use crate::cst::{is_keyword, Cst};
use crate::error::ParseError;

pub(crate) const IMPLIES: &str = "=>";
pub(crate) const ARROW: &str = "->";

/// Parse a single type form.
pub(crate) fn parse_type(cst: &Cst) -> Result<TypeExpr, ParseError> {
    match cst {
        Cst::Atom { span, .. } => match cst.as_symbol() {
            Some(IMPLIES) | Some(ARROW) => Err(ParseError::new(
                format!("unexpected `{}` in type", cst),
                *span,
            )),
            Some(name) if is_keyword(name) => Ok(TypeExpr::Var(Ident::new(name, *span))),
            Some(name) => Ok(TypeExpr::Con(Ident::new(name, *span))),
            None => Err(ParseError::new("expected a type", *span)),
        },
        Cst::List { items, span } => parse_type_items(items, *span),
    }
}

/// Parse the contents of a parenthesized type.
pub(crate) fn parse_type_items(items: &[Cst], span: Span) -> Result<TypeExpr, ParseError> {
    if items.is_empty() {
        return Err(ParseError::new("empty type", span));
    }
    if let Some(implies) = items.iter().find(|c| c.is_symbol(IMPLIES)) {
        return Err(ParseError::new("unexpected `=>` in type", implies.span())
            .with_help("class constraints may only appear at the outermost level of a type"));
    }

    let arrows: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_symbol(ARROW))
        .map(|(i, _)| i)
        .collect();
    if arrows.is_empty() {
        return parse_application(items, span);
    }

    let mut segments = Vec::with_capacity(arrows.len() + 1);
    let mut start = 0;
    for &arrow in &arrows {
        let segment = &items[start..arrow];
        if segment.is_empty() {
            return Err(ParseError::new(
                "missing type before `->`",
                items[arrow].span(),
            ));
        }
        segments.push(segment);
        start = arrow + 1;
    }
    let last = &items[start..];
    if last.is_empty() {
        let arrow = items[arrows[arrows.len() - 1]].span();
        return Err(ParseError::new("missing type after `->`", arrow));
    }
    segments.push(last);

    let mut types = segments
        .into_iter()
        .map(|seg| parse_application(seg, items_span(seg)))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(mut result) = types.pop() else {
        return Err(ParseError::new("empty type", span));
    };
    while let Some(from) = types.pop() {
        let span = from.span().merge(result.span());
        result = TypeExpr::Fun {
            from: Box::new(from),
            to: Box::new(result),
            span,
        };
    }
    Ok(result)
}

/// `T` or `T a b`.
fn parse_application(items: &[Cst], span: Span) -> Result<TypeExpr, ParseError> {
    let (head, args) = items
        .split_first()
        .ok_or_else(|| ParseError::new("empty type", span))?;
    let head = parse_type(head)?;
    if args.is_empty() {
        return Ok(head);
    }
    let args = args.iter().map(parse_type).collect::<Result<Vec<_>, _>>()?;
    Ok(TypeExpr::App {
        head: Box::new(head),
        args,
        span,
    })
}

/// Parse a type that may carry class constraints.
pub(crate) fn parse_qualified_type(cst: &Cst) -> Result<QualifiedTypeExpr, ParseError> {
    let Cst::List { items, span } = cst else {
        return Ok(QualifiedTypeExpr::unqualified(parse_type(cst)?));
    };
    match split_implication(items, *span, "missing type after `=>`")? {
        None => Ok(QualifiedTypeExpr::unqualified(parse_type_items(items, *span)?)),
        Some(split) => {
            let predicates = parse_context(split.left)?;
            let ty = parse_type_items(split.right, items_span(split.right))?;
            Ok(QualifiedTypeExpr {
                predicates,
                ty,
                span: *span,
            })
        }
    }
}

pub(crate) struct Implication<'a> {
    pub(crate) left: &'a [Cst],
    pub(crate) right: &'a [Cst],
}

/// Split a list at its `=>` separator, enforcing the placement rules.
///
/// Returns `None` if there is no separator. `missing_right` is the message
/// used when nothing follows the separator.
pub(crate) fn split_implication<'a>(
    items: &'a [Cst],
    span: Span,
    missing_right: &str,
) -> Result<Option<Implication<'a>>, ParseError> {
    let mut positions = items
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_symbol(IMPLIES))
        .map(|(i, _)| i);
    let Some(idx) = positions.next() else {
        return Ok(None);
    };
    if let Some(second) = positions.next() {
        let sep = items[second].span();
        return Err(ParseError::new("unexpected `=>`", sep)
            .with_note("only one `=>` is allowed here", span)
            .with_suggestion(Suggestion::remove("remove the extra `=>`", sep)));
    }

    let sep = items[idx].span();
    if idx == 0 {
        return Err(ParseError::new("unnecessary `=>`", sep)
            .with_help("there are no constraints before the `=>`")
            .with_suggestion(Suggestion::remove("remove `=>`", sep)));
    }
    if idx + 1 == items.len() {
        return Err(ParseError::new(missing_right, sep)
            .with_note("in this form", span)
            .with_suggestion(Suggestion::remove("remove `=>`", sep)));
    }
    Ok(Some(Implication {
        left: &items[..idx],
        right: &items[idx + 1..],
    }))
}

/// Parse the left side of `=>`: either several parenthesized predicates or
/// a single predicate written inline.
pub(crate) fn parse_context(items: &[Cst]) -> Result<Vec<PredicateExpr>, ParseError> {
    if items.iter().all(Cst::is_list) {
        items.iter().map(parse_predicate).collect()
    } else {
        Ok(vec![parse_predicate_items(items, items_span(items))?])
    }
}

/// Parse `(Class type+)`.
pub(crate) fn parse_predicate(cst: &Cst) -> Result<PredicateExpr, ParseError> {
    match cst {
        Cst::List { items, span } => parse_predicate_items(items, *span),
        Cst::Atom { span, .. } => Err(ParseError::new("expected a class constraint", *span)),
    }
}

pub(crate) fn parse_predicate_items(items: &[Cst], span: Span) -> Result<PredicateExpr, ParseError> {
    let (class, types) = items
        .split_first()
        .ok_or_else(|| ParseError::new("expected a class constraint", span))?;
    let class = class_name(class)?;
    if types.is_empty() {
        return Err(ParseError::new(
            format!("missing type arguments for class `{}`", class.name),
            span,
        ));
    }
    let types = types.iter().map(parse_type).collect::<Result<Vec<_>, _>>()?;
    Ok(PredicateExpr { class, types, span })
}

/// A class name is a plain (non-keyword) symbol.
pub(crate) fn class_name(cst: &Cst) -> Result<Ident, ParseError> {
    match cst.as_symbol() {
        Some(name) if !is_keyword(name) && name != IMPLIES && name != ARROW => {
            Ok(Ident::new(name, cst.span()))
        }
        _ => Err(ParseError::new("expected class name", cst.span())),
    }
}

/// A type variable is a keyword symbol such as `:a`.
pub(crate) fn type_variable(cst: &Cst) -> Result<Ident, ParseError> {
    if let Some(name) = cst.as_keyword() {
        return Ok(Ident::new(name, cst.span()));
    }
    let mut err = ParseError::new("expected a type variable", cst.span())
        .with_help("type variables are keyword symbols, like `:a`");
    if let Ok(id) = ident(cst) {
        err = err.with_suggestion(Suggestion::new(
            format!("use `:{}`", id.name),
            id.span,
            |old| format!(":{old}"),
        ));
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read;

    fn ty(src: &str) -> Result<TypeExpr, ParseError> {
        parse_type(&read(src).unwrap()[0])
    }

    fn qty(src: &str) -> Result<QualifiedTypeExpr, ParseError> {
        parse_qualified_type(&read(src).unwrap()[0])
    }

    #[test]
    fn arrows_associate_right() {
        let t = ty("(:a -> List :a -> Boolean)").unwrap();
        assert_eq!(t.to_string(), "(:a -> ((List :a) -> Boolean))");
    }

    #[test]
    fn parenthesized_single_type_unwraps() {
        assert_eq!(ty("(Integer)").unwrap().to_string(), "Integer");
    }

    #[test]
    fn missing_arrow_operand() {
        assert_eq!(ty("(:a ->)").unwrap_err().message, "missing type after `->`");
        assert_eq!(ty("(-> :a)").unwrap_err().message, "missing type before `->`");
    }

    #[test]
    fn single_inline_constraint() {
        let q = qty("(Eq :a => :a -> :a -> Boolean)").unwrap();
        assert_eq!(q.predicates.len(), 1);
        assert_eq!(q.predicates[0].to_string(), "Eq :a");
        assert_eq!(q.ty.to_string(), "(:a -> (:a -> Boolean))");
    }

    #[test]
    fn several_parenthesized_constraints() {
        let q = qty("((Eq :a) (Ord :b) => :a -> :b)").unwrap();
        let names: Vec<_> = q.predicates.iter().map(|p| p.class.name.as_str()).collect();
        assert_eq!(names, ["Eq", "Ord"]);
    }

    #[test]
    fn constraint_inside_nested_type_is_rejected() {
        let err = ty("(List (Eq :a => :a))").unwrap_err();
        assert_eq!(err.message, "unexpected `=>` in type");
    }

    #[test]
    fn leading_implication_suggests_removal() {
        let err = qty("(=> :a)").unwrap_err();
        assert_eq!(err.message, "unnecessary `=>`");
        assert_eq!(err.suggestions[0].apply("(=> :a)"), "( :a)");
    }

    #[test]
    fn type_variable_suggests_keyword() {
        let src = "a";
        let err = type_variable(&read(src).unwrap()[0]).unwrap_err();
        assert_eq!(err.suggestions[0].apply(src), ":a");
    }
}
