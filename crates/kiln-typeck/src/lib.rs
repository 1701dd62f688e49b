//! Kiln type checker: Hindley-Milner inference with type classes.
//!
//! This crate checks a parsed [`Program`] and infers a type scheme for
//! every definition. Beyond plain HM it supports:
//!
//! - Multi-parameter type classes with superclasses
//! - Functional dependencies and improvement
//! - Context reduction to head-normal form
//! - Defaulting of ambiguous numeric predicates
//! - Declared signatures and `specialize` directives
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation (Ty, TyCon, TyVar, Kind, Scheme)
//! - [`predicate`]: Type predicates and qualified types
//! - [`subst`]: Substitutions, most general unifiers and matching
//! - [`unify`]: Unification engine with occurs check and level-based generalization
//! - [`classes`]: The class environment: entailment, reduction, improvement
//! - [`env`]: The global environment and the local scope stack
//! - [`builtins`]: Built-in types, classes and instances
//! - [`convert`]: Type expressions to types, with kind checking
//! - [`infer`]: Expression inference
//! - [`toplevel`]: The phase-by-phase orchestrator
//! - [`diagnostics`]: Ariadne rendering and JSON output
//! - [`error`]: Type error types with provenance tracking

pub mod builtins;
pub mod classes;
pub mod convert;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod graph;
pub mod infer;
pub mod predicate;
pub mod subst;
pub mod toplevel;
pub mod ty;
pub mod unify;

use rustc_hash::FxHashMap;

use kiln_common::span::Span;
use kiln_parser::Program;

use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::env::Environment;
use crate::error::TypeError;
use crate::predicate::TypePredicate;
use crate::ty::{Scheme, Ty};

/// A checked toplevel definition.
#[derive(Clone, Debug)]
pub struct TypedDefine {
    pub name: String,
    pub scheme: Scheme,
    /// Type of every expression in the body, keyed by span. Quantified
    /// variables appear as the scheme's generic variables.
    pub types: FxHashMap<Span, Ty>,
    pub span: Span,
    pub monomorphize: bool,
}

/// A checked method of an instance.
#[derive(Clone, Debug)]
pub struct TypedMethod {
    pub name: String,
    pub types: FxHashMap<Span, Ty>,
    pub span: Span,
}

/// A checked instance.
#[derive(Clone, Debug)]
pub struct TypedInstance {
    pub head: TypePredicate,
    pub context: Vec<TypePredicate>,
    pub quantified: u32,
    pub methods: Vec<TypedMethod>,
    pub span: Span,
    pub compiler_generated: bool,
}

/// The result of type checking a Kiln program.
#[derive(Debug)]
pub struct TypeckResult {
    /// The environment after every phase that ran.
    pub env: Environment,
    /// Checked definitions in source order.
    pub definitions: Vec<TypedDefine>,
    pub instances: Vec<TypedInstance>,
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeError>,
}

impl TypeckResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn definition(&self, name: &str) -> Option<&TypedDefine> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// The final scheme of a value, whether defined in the program or
    /// built in.
    pub fn scheme(&self, name: &str) -> Option<&Scheme> {
        self.env.lookup_value(name)
    }

    /// Render every error, then every warning.
    pub fn render_errors(
        &self,
        source: &str,
        filename: &str,
        options: &DiagnosticOptions,
    ) -> Vec<String> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .map(|err| render_diagnostic(err, source, filename, options))
            .collect()
    }
}

/// Type-check a parsed program against the built-in environment.
pub fn check(program: &Program) -> TypeckResult {
    check_with(builtins::prelude(), program)
}

/// Type-check a parsed program against `env`.
pub fn check_with(env: Environment, program: &Program) -> TypeckResult {
    toplevel::check_program(env, program)
}
