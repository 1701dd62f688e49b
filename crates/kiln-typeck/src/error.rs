//! Type error types with provenance tracking.
//!
//! Every error carries the span of the construct that produced it, and
//! unification errors carry a [`ConstraintOrigin`] recording why the two
//! types were required to be equal.

use std::fmt;

use kiln_common::diagnostic::Severity;
use kiln_common::span::Span;

use crate::predicate::TypePredicate;
use crate::ty::{Ty, TyVar};

/// Where a type equality constraint came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Argument `index` (0-based) of the call at `call`.
    Application { call: Span, arg: Span, index: usize },
    /// The condition of an `if` must be `Boolean`.
    IfCondition { cond: Span },
    /// Both branches of an `if` must agree.
    IfBranches {
        if_span: Span,
        then_span: Span,
        else_span: Span,
    },
    /// A match arm's pattern must fit the scrutinee.
    MatchPattern { scrutinee: Span, pattern: Span },
    /// All match arms must produce the same type.
    MatchArms { first: Span, arm: Span },
    /// `(the type expr)`
    Annotation { annotation: Span },
    /// A definition checked against its declared or method type.
    Signature { name: String, span: Span },
    /// A constructor pattern's fields.
    Pattern { span: Span },
    /// A recursive reference inside a binding group.
    Definition { span: Span },
    /// Improvement from a functional dependency.
    Fundep { span: Span },
    Builtin,
}

impl ConstraintOrigin {
    pub fn span(&self) -> Option<Span> {
        match self {
            ConstraintOrigin::Application { arg, .. } => Some(*arg),
            ConstraintOrigin::IfCondition { cond } => Some(*cond),
            ConstraintOrigin::IfBranches { else_span, .. } => Some(*else_span),
            ConstraintOrigin::MatchPattern { pattern, .. } => Some(*pattern),
            ConstraintOrigin::MatchArms { arm, .. } => Some(*arm),
            ConstraintOrigin::Annotation { annotation } => Some(*annotation),
            ConstraintOrigin::Signature { span, .. }
            | ConstraintOrigin::Pattern { span }
            | ConstraintOrigin::Definition { span }
            | ConstraintOrigin::Fundep { span } => Some(*span),
            ConstraintOrigin::Builtin => None,
        }
    }
}

/// A type error (or warning) encountered during checking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// Two types that should be equal are not.
    Mismatch {
        expected: Ty,
        found: Ty,
        origin: ConstraintOrigin,
    },
    /// A type variable appears in its own definition.
    InfiniteType {
        var: TyVar,
        ty: Ty,
        origin: ConstraintOrigin,
    },
    UnboundVariable { name: String, span: Span },
    UnknownType { name: String, span: Span },
    UnknownClass { name: String, span: Span },
    UnknownConstructor { name: String, span: Span },
    /// A constructor pattern with the wrong number of fields.
    ConstructorArity {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A type constructor applied to the wrong number or kind of arguments.
    KindMismatch { ty: String, message: String, span: Span },
    /// A type variable not bound where it is used.
    UnboundTypeVariable {
        name: String,
        context: &'static str,
        span: Span,
    },
    /// A name defined twice in the same namespace.
    Duplicate {
        what: &'static str,
        name: String,
        span: Span,
        previous: Option<Span>,
    },
    /// A `repr` attribute that does not fit its type.
    InvalidRepr {
        type_name: String,
        repr: &'static str,
        reason: &'static str,
        span: Span,
    },
    SuperclassCycle { classes: Vec<String>, span: Span },
    /// A predicate with the wrong number of class arguments.
    ClassArity {
        class: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A class method whose type does not mention any class variable.
    MethodMissingClassVariable {
        class: String,
        method: String,
        span: Span,
    },
    OverlappingInstances {
        instance: TypePredicate,
        existing: TypePredicate,
        span: Span,
        previous: Option<Span>,
    },
    FundepConflict {
        instance: TypePredicate,
        existing: TypePredicate,
        span: Span,
        previous: Option<Span>,
    },
    MissingMethod {
        method: String,
        instance: TypePredicate,
        span: Span,
    },
    UnknownMethod {
        method: String,
        class: String,
        span: Span,
    },
    MissingSuperclassInstance {
        instance: TypePredicate,
        superclass: TypePredicate,
        span: Span,
    },
    /// No instance satisfies a predicate.
    NoInstance { predicate: TypePredicate, span: Span },
    /// A predicate a definition needs but its declared type does not provide.
    MissingConstraint {
        predicate: TypePredicate,
        name: String,
        span: Span,
    },
    /// An ambiguous predicate whose class has no defaults.
    AmbiguousPredicate {
        predicate: TypePredicate,
        name: String,
        span: Span,
    },
    /// An ambiguous predicate that no default type satisfies. The
    /// definition is dropped, but checking continues.
    AmbiguousDefault {
        predicate: TypePredicate,
        name: String,
        span: Span,
    },
    /// A `declare` with no matching `define`.
    OrphanDeclaration { name: String, span: Span },
    /// A `declare` naming something that cannot be declared.
    InvalidDeclaration {
        name: String,
        what: &'static str,
        span: Span,
    },
    /// The body is less general than the declared type.
    SignatureTooGeneral {
        name: String,
        declared: String,
        span: Span,
    },
    InvalidSpecialization {
        from: String,
        to: String,
        reason: String,
        span: Span,
    },
}

impl TypeError {
    pub fn severity(&self) -> Severity {
        match self {
            TypeError::AmbiguousDefault { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }

    /// The primary span of the error, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            TypeError::Mismatch { origin, .. } | TypeError::InfiniteType { origin, .. } => {
                origin.span()
            }
            TypeError::UnboundVariable { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::UnknownClass { span, .. }
            | TypeError::UnknownConstructor { span, .. }
            | TypeError::ConstructorArity { span, .. }
            | TypeError::KindMismatch { span, .. }
            | TypeError::UnboundTypeVariable { span, .. }
            | TypeError::Duplicate { span, .. }
            | TypeError::InvalidRepr { span, .. }
            | TypeError::SuperclassCycle { span, .. }
            | TypeError::ClassArity { span, .. }
            | TypeError::MethodMissingClassVariable { span, .. }
            | TypeError::OverlappingInstances { span, .. }
            | TypeError::FundepConflict { span, .. }
            | TypeError::MissingMethod { span, .. }
            | TypeError::UnknownMethod { span, .. }
            | TypeError::MissingSuperclassInstance { span, .. }
            | TypeError::NoInstance { span, .. }
            | TypeError::MissingConstraint { span, .. }
            | TypeError::AmbiguousPredicate { span, .. }
            | TypeError::AmbiguousDefault { span, .. }
            | TypeError::OrphanDeclaration { span, .. }
            | TypeError::InvalidDeclaration { span, .. }
            | TypeError::SignatureTooGeneral { span, .. }
            | TypeError::InvalidSpecialization { span, .. } => Some(*span),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, found, ..
            } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            TypeError::InfiniteType { var, ty, .. } => {
                write!(f, "infinite type: `?{}` occurs in `{}`", var.0, ty)
            }
            TypeError::UnboundVariable { name, .. } => {
                write!(f, "unbound variable `{}`", name)
            }
            TypeError::UnknownType { name, .. } => write!(f, "unknown type `{}`", name),
            TypeError::UnknownClass { name, .. } => write!(f, "unknown class `{}`", name),
            TypeError::UnknownConstructor { name, .. } => {
                write!(f, "unknown constructor `{}`", name)
            }
            TypeError::ConstructorArity {
                name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "constructor `{}` has {} fields, but the pattern has {}",
                    name, expected, found
                )
            }
            TypeError::KindMismatch { ty, message, .. } => {
                write!(f, "kind mismatch in `{}`: {}", ty, message)
            }
            TypeError::UnboundTypeVariable { name, context, .. } => {
                write!(f, "type variable `{}` is not bound in {}", name, context)
            }
            TypeError::Duplicate { what, name, .. } => {
                write!(f, "duplicate {} `{}`", what, name)
            }
            TypeError::InvalidRepr {
                type_name,
                repr,
                reason,
                ..
            } => {
                write!(f, "invalid `{}` repr for type `{}`: {}", repr, type_name, reason)
            }
            TypeError::SuperclassCycle { classes, .. } => {
                write!(f, "superclass cycle: {}", classes.join(" -> "))
            }
            TypeError::ClassArity {
                class,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "class `{}` expects {} type arguments, found {}",
                    class, expected, found
                )
            }
            TypeError::MethodMissingClassVariable { class, method, .. } => {
                write!(
                    f,
                    "method `{}` of class `{}` does not mention any class variable",
                    method, class
                )
            }
            TypeError::OverlappingInstances {
                instance, existing, ..
            } => {
                write!(
                    f,
                    "instance `{}` overlaps with instance `{}`",
                    instance, existing
                )
            }
            TypeError::FundepConflict {
                instance, existing, ..
            } => {
                write!(
                    f,
                    "instance `{}` conflicts with instance `{}` under a functional dependency",
                    instance, existing
                )
            }
            TypeError::MissingMethod {
                method, instance, ..
            } => {
                write!(f, "instance `{}` is missing method `{}`", instance, method)
            }
            TypeError::UnknownMethod { method, class, .. } => {
                write!(f, "`{}` is not a method of class `{}`", method, class)
            }
            TypeError::MissingSuperclassInstance {
                instance,
                superclass,
                ..
            } => {
                write!(
                    f,
                    "instance `{}` requires an instance for `{}`",
                    instance, superclass
                )
            }
            TypeError::NoInstance { predicate, .. } => {
                write!(f, "no instance for `{}`", predicate)
            }
            TypeError::MissingConstraint {
                predicate, name, ..
            } => {
                write!(
                    f,
                    "declared type of `{}` is missing the constraint `{}`",
                    name, predicate
                )
            }
            TypeError::AmbiguousPredicate {
                predicate, name, ..
            } => {
                write!(f, "ambiguous predicate `{}` in `{}`", predicate, name)
            }
            TypeError::AmbiguousDefault {
                predicate, name, ..
            } => {
                write!(
                    f,
                    "unable to default ambiguous predicate `{}` in `{}`",
                    predicate, name
                )
            }
            TypeError::OrphanDeclaration { name, .. } => {
                write!(f, "declaration of `{}` has no matching definition", name)
            }
            TypeError::InvalidDeclaration { name, what, .. } => {
                write!(f, "cannot declare a type for {} `{}`", what, name)
            }
            TypeError::SignatureTooGeneral { name, declared, .. } => {
                write!(
                    f,
                    "the definition of `{}` is less general than its declared type `{}`",
                    name, declared
                )
            }
            TypeError::InvalidSpecialization {
                from, to, reason, ..
            } => {
                write!(f, "invalid specialization of `{}` to `{}`: {}", from, to, reason)
            }
        }
    }
}

impl std::error::Error for TypeError {}
