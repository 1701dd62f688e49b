//! The structured program model produced by the toplevel parser.
//!
//! - [`types`]: type expressions, predicates and qualified types
//! - [`expr`]: expressions, patterns and bodies
//! - [`toplevel`]: attributes, the seven toplevel shapes and [`Program`]
//!
//! These are plain owned values. Nothing here points at anything else by
//! reference; definitions mention each other only by name.

pub mod expr;
pub mod toplevel;
pub mod types;

use std::fmt;

use kiln_common::span::Span;

pub use expr::{Body, Expr, Literal, MatchArm, Pattern};
pub use toplevel::{
    AttrMonomorphize, AttrRepr, Attribute, Constructor, Fundep, InstanceMethodDefinition,
    MethodDefinition, Program, ReprKind, ToplevelDeclare, ToplevelDefine, ToplevelDefineClass,
    ToplevelDefineInstance, ToplevelDefineType, ToplevelSpecialize,
};
pub use types::{PredicateExpr, QualifiedTypeExpr, TypeExpr};

/// A name together with the span it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
