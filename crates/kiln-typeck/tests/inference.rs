//! End-to-end inference tests: parse a program, check it, and compare the
//! printed schemes.

use kiln_typeck::ty::{PrintOptions, Ty};
use kiln_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

fn check_source(src: &str) -> TypeckResult {
    let program = kiln_parser::parse_program(src, "test.kiln").expect("source should parse");
    kiln_typeck::check(&program)
}

/// Check a program that must be free of errors.
fn check_ok(src: &str) -> TypeckResult {
    let result = check_source(src);
    assert!(
        result.errors.is_empty(),
        "unexpected errors for {:?}: {:?}",
        src,
        result.errors
    );
    result
}

fn scheme(result: &TypeckResult, name: &str) -> String {
    result
        .scheme(name)
        .unwrap_or_else(|| panic!("no scheme for `{name}`"))
        .to_string()
}

// ── Definitions ────────────────────────────────────────────────────────

#[test]
fn identity_and_const() {
    let result = check_ok("(define (id x) x) (define (const x y) x)");
    assert_eq!(scheme(&result, "id"), ":a -> :a");
    assert_eq!(scheme(&result, "const"), ":a -> :b -> :a");
}

#[test]
fn arithmetic_keeps_its_class_constraint() {
    let result = check_ok("(define (double x) (+ x x))");
    assert_eq!(scheme(&result, "double"), "Num :a => :a -> :a");
}

#[test]
fn values_are_defaulted() {
    let result = check_ok("(define x (+ 1 2))");
    assert_eq!(scheme(&result, "x"), "Integer");
    assert!(result.warnings.is_empty());
}

#[test]
fn nullary_functions_take_unit() {
    let result = check_ok("(define (answer) 42) (define y (answer))");
    assert_eq!(scheme(&result, "answer"), "Num :a => Unit -> :a");
    assert_eq!(scheme(&result, "y"), "Integer");
}

#[test]
fn superclasses_are_simplified_away() {
    let result = check_ok("(define (same-sum a b) (== (+ a b) a))");
    assert_eq!(scheme(&result, "same-sum"), "Num :a => :a -> :a -> Boolean");
}

#[test]
fn mutual_recursion_is_inferred_together() {
    let result = check_ok(
        r#"
        (define (even? n) (if (== n 0) True (odd? (- n 1))))
        (define (odd? n) (if (== n 0) False (even? (- n 1))))
        "#,
    );
    assert_eq!(scheme(&result, "even?"), "Num :a => :a -> Boolean");
    assert_eq!(scheme(&result, "odd?"), "Num :a => :a -> Boolean");
}

#[test]
fn definitions_may_use_later_definitions() {
    let result = check_ok("(define (f x) (g x)) (define (g x) (Cons x Nil))");
    assert_eq!(scheme(&result, "g"), ":a -> List :a");
    assert_eq!(scheme(&result, "f"), ":a -> List :a");
}

#[test]
fn let_bindings_are_polymorphic() {
    let result = check_ok(
        r#"
        (define (both)
          (let ((f (fn (x) x)))
            (f 1)
            (f True)))
        "#,
    );
    assert_eq!(scheme(&result, "both"), "Unit -> Boolean");
}

#[test]
fn annotations_fix_types() {
    let result = check_ok("(define (half x) (the Double-Float x))");
    assert_eq!(scheme(&result, "half"), "Double-Float -> Double-Float");
}

// ── Types ──────────────────────────────────────────────────────────────

#[test]
fn user_types_and_matching() {
    let result = check_ok(
        r#"
        (define-type (Maybe :a) (Just :a) Nothing)
        (define (from-maybe d m)
          (match m
            ((Just x) x)
            (Nothing d)))
        "#,
    );
    assert_eq!(scheme(&result, "from-maybe"), ":a -> Maybe :a -> :a");
    assert_eq!(scheme(&result, "Just"), ":a -> Maybe :a");
}

#[test]
fn higher_kinded_parameters_are_inferred() {
    let result = check_ok("(define-type (Wrap :f :a) (Wrap (:f :a)))");
    let info = result.env.lookup_type("Wrap").expect("Wrap is registered");
    assert_eq!(info.kind.to_string(), "(* -> *) -> * -> *");
    assert_eq!(scheme(&result, "Wrap"), ":a :b -> Wrap :a :b");
}

// ── Classes ────────────────────────────────────────────────────────────

const SHOW: &str = r#"
    (define-class (Show :a) (show (:a -> String)))
    (define-instance (Show Integer) (define (show x) "integer"))
    (define-instance (Show :a => Show (List :a)) (define (show xs) "list"))
"#;

#[test]
fn class_methods_carry_their_class() {
    let result = check_ok(&format!("{SHOW} (define (describe x) (show x))"));
    assert_eq!(scheme(&result, "show"), "Show :a => :a -> String");
    assert_eq!(scheme(&result, "describe"), "Show :a => :a -> String");
    assert_eq!(result.instances.len(), 2);
}

#[test]
fn defaulting_considers_every_class() {
    let result = check_ok(&format!("{SHOW} (define s (show 1))"));
    assert_eq!(scheme(&result, "s"), "String");
}

#[test]
fn instance_contexts_reduce_predicates() {
    let result = check_ok(&format!(
        "{SHOW} (define (show-all xs) (show (Cons xs Nil)))"
    ));
    assert_eq!(scheme(&result, "show-all"), "Show :a => :a -> String");
}

#[test]
fn declared_types_are_kept() {
    let result = check_ok(
        r#"
        (declare twice (Num :a => :a -> :a))
        (define (twice x) (+ x x))
        (declare first-int (Integer -> Integer -> Integer))
        (define (first-int a b) a)
        "#,
    );
    assert_eq!(scheme(&result, "twice"), "Num :a => :a -> :a");
    assert_eq!(scheme(&result, "first-int"), "Integer -> Integer -> Integer");
}

#[test]
fn declared_contexts_cover_superclasses() {
    let result = check_ok(
        r#"
        (declare same? (Ord :a => :a -> :a -> Boolean))
        (define (same? x y) (== x y))
        "#,
    );
    assert_eq!(scheme(&result, "same?"), "Ord :a => :a -> :a -> Boolean");
}

#[test]
fn functional_dependencies_improve_types() {
    let result = check_ok(
        r#"
        (define-class (Container :c :e (:c -> :e))
          (empty :c)
          (insert (:e -> :c -> :c)))
        (define-instance (Container (List :a) :a)
          (define empty Nil)
          (define (insert x xs) (Cons x xs)))
        (define (single x) (insert x (the (List Integer) empty)))
        (define (ins x c) (insert x c))
        "#,
    );
    assert_eq!(scheme(&result, "single"), "Integer -> List Integer");
    assert_eq!(scheme(&result, "ins"), "Container :b :a => :a -> :b -> :b");
}

// ── Results ────────────────────────────────────────────────────────────

#[test]
fn definitions_record_expression_types() {
    let src = "(define (inc x) (+ x 1))";
    let result = check_ok(src);
    let define = result.definition("inc").expect("inc is defined");
    let start = src.find("(+ x 1)").expect("call in source") as u32;
    let span = kiln_common::span::Span::new(start, start + "(+ x 1)".len() as u32);
    let ty: &Ty = define.types.get(&span).expect("call has a type");
    assert_eq!(ty.display(PrintOptions::ASCII).to_string(), ":a");
}

#[test]
fn definitions_come_back_in_source_order() {
    let result = check_ok("(define (b) (a)) (define (a) 1) (define c 2)");
    let names: Vec<&str> = result.definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["b", "a", "c"]);
}

#[test]
fn monomorphize_is_recorded() {
    let result = check_ok("(monomorphize) (define (f x) x)");
    assert!(result.env.is_monomorphize("f"));
    assert!(result.definition("f").map(|d| d.monomorphize).unwrap_or(false));
}

#[test]
fn specializations_are_recorded() {
    let result = check_ok(
        r#"
        (define (id x) x)
        (declare id-int (Integer -> Integer))
        (define (id-int x) x)
        (specialize id id-int (Integer -> Integer))
        "#,
    );
    let specs = result.env.specializations();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].from, "id");
    assert_eq!(specs[0].to, "id-int");
    assert_eq!(specs[0].ty.to_string(), "Integer -> Integer");
}

#[test]
fn constrained_specializations_are_recorded() {
    let result = check_ok(
        r#"
        (declare add1 (Num :a => :a -> :a))
        (define (add1 x) (+ x 1))
        (declare add1-int (Integer -> Integer))
        (define (add1-int x) (+ x 1))
        (specialize add1 add1-int (Integer -> Integer))
        "#,
    );
    assert_eq!(result.env.specializations().len(), 1);
}

#[test]
fn nullary_instance_methods_take_unit() {
    let result = check_ok(
        "(define-class (Zero :a) (zero (Unit -> :a))) (define-instance (Zero Integer) (define (zero) 0))",
    );
    assert_eq!(result.instances.len(), 1);
    assert_eq!(result.instances[0].methods[0].name, "zero");
}

#[test]
fn unicode_printing() {
    let result = check_ok("(define (double x) (+ x x))");
    let scheme = result.scheme("double").expect("double is defined");
    insta::assert_snapshot!(scheme.display(PrintOptions::UNICODE).to_string(), @"Num :a ⇒ :a → :a");
}
