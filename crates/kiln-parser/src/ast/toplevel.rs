use kiln_common::span::Span;

use super::expr::{Body, Pattern};
use super::types::{PredicateExpr, QualifiedTypeExpr, TypeExpr};
use super::Ident;
use crate::cst::Cst;

// ── Attributes ─────────────────────────────────────────────────────────

/// `(monomorphize)`: specialize the next definition at each call site.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrMonomorphize {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReprKind {
    Enum,
    Lisp,
    Transparent,
    /// Represented as a host type, given as an uninterpreted form.
    Native(Cst),
}

impl ReprKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ReprKind::Enum => ":enum",
            ReprKind::Lisp => ":lisp",
            ReprKind::Transparent => ":transparent",
            ReprKind::Native(_) => ":native",
        }
    }
}

/// `(repr :kind ...)`: how the next type definition is represented.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrRepr {
    pub kind: ReprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Monomorphize(AttrMonomorphize),
    Repr(AttrRepr),
}

impl Attribute {
    pub fn span(&self) -> Span {
        match self {
            Attribute::Monomorphize(a) => a.span,
            Attribute::Repr(a) => a.span,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Monomorphize(_) => "monomorphize",
            Attribute::Repr(_) => "repr",
        }
    }
}

// ── Type definitions ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub name: Ident,
    pub fields: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelDefineType {
    pub name: Ident,
    /// Parameters in order. Kinds are inferred by the type checker.
    pub vars: Vec<Ident>,
    pub docstring: Option<String>,
    pub constructors: Vec<Constructor>,
    pub repr: Option<AttrRepr>,
    pub span: Span,
    /// Span of the name and variables only.
    pub head_span: Span,
}

impl ToplevelDefineType {
    pub fn with_repr(self, repr: Option<AttrRepr>) -> Self {
        Self { repr, ..self }
    }
}

// ── Values ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelDeclare {
    pub name: Ident,
    pub ty: QualifiedTypeExpr,
    pub monomorphize: Option<AttrMonomorphize>,
    pub span: Span,
}

impl ToplevelDeclare {
    pub fn with_monomorphize(self, monomorphize: Option<AttrMonomorphize>) -> Self {
        Self {
            monomorphize,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelDefine {
    pub name: Ident,
    /// Parameter patterns. Empty for a value binding; a nullary function
    /// has a single wildcard.
    pub params: Vec<Pattern>,
    /// The parameters exactly as written. Later passes may rewrite
    /// `params`; diagnostics refer to these.
    pub orig_params: Vec<Pattern>,
    pub docstring: Option<String>,
    pub body: Body,
    pub monomorphize: Option<AttrMonomorphize>,
    pub span: Span,
}

impl ToplevelDefine {
    pub fn with_monomorphize(self, monomorphize: Option<AttrMonomorphize>) -> Self {
        Self {
            monomorphize,
            ..self
        }
    }

    pub fn is_function(&self) -> bool {
        !self.params.is_empty()
    }
}

// ── Classes and instances ──────────────────────────────────────────────

/// `(:a :b -> :c)` inside a class head.
#[derive(Debug, Clone, PartialEq)]
pub struct Fundep {
    pub left: Vec<Ident>,
    pub right: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    pub name: Ident,
    pub ty: QualifiedTypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelDefineClass {
    pub name: Ident,
    pub vars: Vec<Ident>,
    pub superclasses: Vec<PredicateExpr>,
    pub fundeps: Vec<Fundep>,
    pub docstring: Option<String>,
    pub methods: Vec<MethodDefinition>,
    pub span: Span,
    pub head_span: Span,
}

impl ToplevelDefineClass {
    /// Class variables, including ones only mentioned in fundeps, in order
    /// of first appearance.
    pub fn all_vars(&self) -> Vec<Ident> {
        let mut out: Vec<Ident> = Vec::new();
        let fundep_vars = self
            .fundeps
            .iter()
            .flat_map(|fd| fd.left.iter().chain(fd.right.iter()));
        for var in self.vars.iter().chain(fundep_vars) {
            if !out.iter().any(|v| v.name == var.name) {
                out.push(var.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMethodDefinition {
    pub name: Ident,
    pub params: Vec<Pattern>,
    pub orig_params: Vec<Pattern>,
    pub body: Body,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelDefineInstance {
    pub context: Vec<PredicateExpr>,
    pub predicate: PredicateExpr,
    pub docstring: Option<String>,
    pub methods: Vec<InstanceMethodDefinition>,
    pub span: Span,
    pub head_span: Span,
    /// Set for instances synthesized by derivation rather than written by
    /// the user. They are checked after user instances.
    pub compiler_generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToplevelSpecialize {
    pub from: Ident,
    pub to: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

// ── Program ────────────────────────────────────────────────────────────

/// Everything parsed from one source file, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub package: String,
    pub file: String,
    pub types: Vec<ToplevelDefineType>,
    pub declares: Vec<ToplevelDeclare>,
    pub defines: Vec<ToplevelDefine>,
    pub classes: Vec<ToplevelDefineClass>,
    pub instances: Vec<ToplevelDefineInstance>,
    pub specializations: Vec<ToplevelSpecialize>,
}

impl Program {
    pub fn new(package: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            file: file.into(),
            ..Self::default()
        }
    }

    /// Total number of toplevel definitions.
    pub fn len(&self) -> usize {
        self.types.len()
            + self.declares.len()
            + self.defines.len()
            + self.classes.len()
            + self.instances.len()
            + self.specializations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spans of every definition, sorted by start offset. Source order of
    /// the whole program is recoverable from this.
    pub fn spans_in_source_order(&self) -> Vec<Span> {
        let mut spans: Vec<Span> = self
            .types
            .iter()
            .map(|d| d.span)
            .chain(self.declares.iter().map(|d| d.span))
            .chain(self.defines.iter().map(|d| d.span))
            .chain(self.classes.iter().map(|d| d.span))
            .chain(self.instances.iter().map(|d| d.span))
            .chain(self.specializations.iter().map(|d| d.span))
            .collect();
        spans.sort_by_key(|s| s.start);
        spans
    }
}
