use std::fmt;

use kiln_common::span::Span;

use super::Ident;

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A keyword symbol such as `:a`.
    Var(Ident),
    /// A type constructor name such as `Integer` or `List`.
    Con(Ident),
    /// `(List :a)`, `(Map String :v)`.
    App {
        head: Box<TypeExpr>,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `(:a -> :b)`. Arrows associate to the right.
    Fun {
        from: Box<TypeExpr>,
        to: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Var(id) | TypeExpr::Con(id) => id.span,
            TypeExpr::App { span, .. } | TypeExpr::Fun { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Var(id) | TypeExpr::Con(id) => write!(f, "{id}"),
            TypeExpr::App { head, args, .. } => {
                write!(f, "({head}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            TypeExpr::Fun { from, to, .. } => write!(f, "({from} -> {to})"),
        }
    }
}

/// `C t1 .. tn` as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateExpr {
    pub class: Ident,
    pub types: Vec<TypeExpr>,
    pub span: Span,
}

impl fmt::Display for PredicateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        for ty in &self.types {
            write!(f, " {ty}")?;
        }
        Ok(())
    }
}

/// A type with a (possibly empty) list of class constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedTypeExpr {
    pub predicates: Vec<PredicateExpr>,
    pub ty: TypeExpr,
    pub span: Span,
}

impl QualifiedTypeExpr {
    pub fn unqualified(ty: TypeExpr) -> Self {
        let span = ty.span();
        Self {
            predicates: Vec::new(),
            ty,
            span,
        }
    }
}
