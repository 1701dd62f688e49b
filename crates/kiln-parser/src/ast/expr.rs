use kiln_common::span::Span;

use super::types::TypeExpr;
use super::Ident;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Binds the matched value to a name.
    Var(Ident),
    /// `_`
    Wildcard(Span),
    Literal(Literal, Span),
    /// `(Cons x xs)`, `(None)`.
    Constructor {
        name: Ident,
        patterns: Vec<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Var(id) => id.span,
            Pattern::Wildcard(span)
            | Pattern::Literal(_, span)
            | Pattern::Constructor { span, .. } => *span,
        }
    }

    /// Names bound by the pattern, left to right.
    pub fn bound_names(&self) -> Vec<&Ident> {
        let mut out = Vec::new();
        self.collect_bound(&mut out);
        out
    }

    fn collect_bound<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pattern::Var(id) => out.push(id),
            Pattern::Wildcard(_) | Pattern::Literal(..) => {}
            Pattern::Constructor { patterns, .. } => {
                for p in patterns {
                    p.collect_bound(out);
                }
            }
        }
    }
}

/// A non-empty sequence of expressions; the last one is the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub exprs: Vec<Expr>,
    pub span: Span,
}

impl Body {
    pub fn value(&self) -> Option<&Expr> {
        self.exprs.last()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Body,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Var(Ident),
    /// `(f a b)`. A call with no arguments applies the function to `Unit`.
    App {
        func: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `(fn (x y) body)`. Zero parameters are represented by one wildcard.
    Lambda {
        params: Vec<Pattern>,
        body: Body,
        span: Span,
    },
    /// `(let ((x e) (y e)) body)`. Bindings are sequential.
    Let {
        bindings: Vec<(Ident, Expr)>,
        body: Body,
        span: Span,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Progn(Body),
    /// `(the Integer x)`.
    The {
        ty: TypeExpr,
        expr: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Var(id) => id.span,
            Expr::Progn(body) => body.span,
            Expr::Literal(_, span)
            | Expr::App { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::Let { span, .. }
            | Expr::If { span, .. }
            | Expr::Match { span, .. }
            | Expr::The { span, .. } => *span,
        }
    }
}
