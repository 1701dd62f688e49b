//! Programs the checker must reject, and the warnings it emits.

use kiln_typeck::error::TypeError;
use kiln_typeck::TypeckResult;

fn check_source(src: &str) -> TypeckResult {
    let program = kiln_parser::parse_program(src, "test.kiln").expect("source should parse");
    kiln_typeck::check(&program)
}

/// The first error, which must exist.
fn first_error(src: &str) -> TypeError {
    let result = check_source(src);
    assert!(
        !result.errors.is_empty(),
        "expected at least one error for source: {:?}",
        src
    );
    result.errors[0].clone()
}

const SHOW: &str = "(define-class (Show :a) (show (:a -> String)))";

// ── Expressions ────────────────────────────────────────────────────────

#[test]
fn if_condition_must_be_boolean() {
    let err = first_error(r#"(define x (if "yes" 1 2))"#);
    assert_eq!(err.to_string(), "type mismatch: expected `Boolean`, found `String`");
}

#[test]
fn unbound_variables() {
    let err = first_error("(define (f x) y)");
    assert_eq!(err.to_string(), "unbound variable `y`");
}

#[test]
fn missing_instances() {
    let err = first_error(r#"(define x (+ "a" "b"))"#);
    assert!(
        matches!(&err, TypeError::NoInstance { predicate, .. } if predicate.to_string() == "Num String"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn constructor_patterns_check_arity() {
    let err = first_error("(define (f xs) (match xs ((Cons x) x) (Nil 0)))");
    assert_eq!(err.to_string(), "constructor `Cons` has 2 fields, but the pattern has 1");
}

#[test]
fn dependents_of_failed_definitions_are_skipped() {
    let result = check_source("(define (f x) y) (define (g x) (f x))");
    assert_eq!(result.errors.len(), 1);
}

// ── Signatures ─────────────────────────────────────────────────────────

#[test]
fn signatures_must_provide_constraints() {
    let err = first_error("(declare f (:a -> :a -> Boolean)) (define (f x y) (== x y))");
    assert!(
        matches!(&err, TypeError::MissingConstraint { predicate, name, .. }
            if predicate.to_string() == "Eq :a" && name == "f"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn signatures_cannot_be_more_general_than_the_body() {
    let err = first_error("(declare f (:a -> Integer)) (define (f x) x)");
    assert!(
        matches!(&err, TypeError::SignatureTooGeneral { name, .. } if name == "f"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn declarations_need_definitions() {
    let err = first_error("(declare g (Integer -> Integer))");
    assert_eq!(err.to_string(), "declaration of `g` has no matching definition");
}

#[test]
fn methods_cannot_be_declared() {
    let err = first_error("(declare == (Integer -> Integer -> Boolean))");
    assert!(matches!(err, TypeError::InvalidDeclaration { what: "class method", .. }));
}

#[test]
fn duplicate_definitions() {
    let err = first_error("(define x 1) (define x 2)");
    assert_eq!(err.to_string(), "duplicate definition `x`");
}

// ── Types ──────────────────────────────────────────────────────────────

#[test]
fn constructor_fields_must_use_bound_variables() {
    let err = first_error("(define-type (T :a) (MkT :b))");
    assert_eq!(err.to_string(), "type variable `:b` is not bound in the type definition");
}

#[test]
fn transparent_types_need_one_field() {
    let err = first_error("(repr :transparent) (define-type Pair (Pair Integer Integer))");
    assert!(matches!(err, TypeError::InvalidRepr { repr: ":transparent", .. }), "{err:?}");
}

#[test]
fn kinds_are_checked() {
    let err = first_error(
        "(define-type (Box :f) (Box (:f Integer))) (declare g (Box Integer -> Integer)) (define (g b) 1)",
    );
    assert!(matches!(err, TypeError::KindMismatch { .. }), "{err:?}");
}

#[test]
fn builtin_types_cannot_be_redefined() {
    let err = first_error("(define-type Integer Zero)");
    assert_eq!(err.to_string(), "duplicate type `Integer`");
}

// ── Classes and instances ──────────────────────────────────────────────

#[test]
fn superclass_cycles() {
    let err = first_error(
        "(define-class (B :a => A :a) (a-m (:a -> :a))) (define-class (A :a => B :a) (b-m (:a -> :a)))",
    );
    assert!(matches!(err, TypeError::SuperclassCycle { .. }), "{err:?}");
}

#[test]
fn instances_must_define_every_method() {
    let err = first_error(&format!("{SHOW} (define-instance (Show Integer))"));
    assert!(
        matches!(&err, TypeError::MissingMethod { method, .. } if method == "show"),
        "{err:?}"
    );
}

#[test]
fn overlapping_instances() {
    let err = first_error(&format!(
        r#"{SHOW}
        (define-instance (Show Integer) (define (show x) "a"))
        (define-instance (Show Integer) (define (show x) "b"))"#
    ));
    assert!(matches!(err, TypeError::OverlappingInstances { .. }), "{err:?}");
}

#[test]
fn superclass_instances_are_required() {
    let err = first_error(&format!(
        r#"{SHOW}
        (define-class (Show :a => Pretty :a) (pretty (:a -> String)))
        (define-instance (Pretty Integer) (define (pretty x) "x"))"#
    ));
    assert!(
        matches!(&err, TypeError::MissingSuperclassInstance { superclass, .. }
            if superclass.to_string() == "Show Integer"),
        "{err:?}"
    );
}

#[test]
fn instance_methods_are_checked_against_the_class() {
    let err = first_error(&format!(
        "{SHOW} (define-instance (Show Integer) (define (show x) x))"
    ));
    assert!(matches!(err, TypeError::Mismatch { .. }), "{err:?}");
}

#[test]
fn nullary_instance_methods_take_unit() {
    let err = first_error(
        "(define-class (C :a) (m (:a -> Integer))) (define-instance (C String) (define (m) 1))",
    );
    assert!(
        matches!(&err, TypeError::Mismatch { found, .. } if found.to_string().starts_with("Unit")),
        "{err:?}"
    );
}

#[test]
fn unknown_classes() {
    let err = first_error("(define-instance (Frobnicate Integer))");
    assert_eq!(err.to_string(), "unknown class `Frobnicate`");
}

// ── Ambiguity and defaulting ───────────────────────────────────────────

#[test]
fn ambiguity_without_defaults_is_an_error() {
    let err = first_error(&format!(
        "{SHOW} (define-class (Default :a) (default-value :a)) (define x (show default-value))"
    ));
    assert!(
        matches!(&err, TypeError::AmbiguousPredicate { name, .. } if name == "x"),
        "{err:?}"
    );
}

#[test]
fn failed_defaulting_is_a_warning() {
    let result = check_source(&format!("{SHOW} (define x (show 1))"));
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    assert!(matches!(result.warnings[0], TypeError::AmbiguousDefault { .. }));
    assert!(result.definition("x").is_none());
    assert_eq!(result.scheme("x").map(|s| s.to_string()).as_deref(), Some("String"));
}

// ── Specializations ────────────────────────────────────────────────────

#[test]
fn specializations_must_fit_both_schemes() {
    let err = first_error(
        r#"
        (define (id x) x)
        (declare inc (Integer -> Integer))
        (define (inc x) x)
        (specialize id inc (String -> String))
        "#,
    );
    assert!(matches!(err, TypeError::InvalidSpecialization { .. }), "{err:?}");
}

#[test]
fn specializations_must_satisfy_constraints() {
    let err = first_error(
        r#"
        (declare add1 (Num :a => :a -> :a))
        (define (add1 x) (+ x 1))
        (declare add1-s (String -> String))
        (define (add1-s x) x)
        (specialize add1 add1-s (String -> String))
        "#,
    );
    assert!(
        matches!(&err, TypeError::InvalidSpecialization { reason, .. }
            if reason.contains("`Num String`")),
        "{err:?}"
    );
}

#[test]
fn specializations_need_known_names() {
    let err = first_error("(define (id x) x) (specialize id nope (Integer -> Integer))");
    assert_eq!(err.to_string(), "unbound variable `nope`");
}
