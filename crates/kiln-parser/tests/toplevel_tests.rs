//! Toplevel parser integration tests.

use kiln_parser::ast::{Attribute, Pattern, ReprKind};
use kiln_parser::{
    parse_forms, parse_program, parse_program_with, read, Cst, MacroTable, NoMacros, ParseError,
    Program, ToplevelParser, MAX_EXPANSION_DEPTH,
};

fn parse(source: &str) -> Result<Program, ParseError> {
    parse_program(source, "test.kiln")
}

// ── Source order ───────────────────────────────────────────────────────

#[test]
fn definitions_keep_source_order() {
    let source = r#"
        (define-type Color Red Green)
        (declare id (:a -> :a))
        (define (id x) x)
        (define-class (Show :a) (show (:a -> String)))
        (define-instance (Show Color) (define (show c) "color"))
        (define zero 0)
        (specialize id id-int (Integer -> Integer))
        (define (id-int x) x)
    "#;
    let program = parse(source).unwrap();
    assert_eq!(program.len(), 8);

    let starts: Vec<u32> = read(source)
        .unwrap()
        .iter()
        .map(|form| form.span().start)
        .collect();
    let spans: Vec<u32> = program
        .spans_in_source_order()
        .iter()
        .map(|span| span.start)
        .collect();
    assert_eq!(spans, starts);

    let defines: Vec<&str> = program.defines.iter().map(|d| d.name.name.as_str()).collect();
    assert_eq!(defines, ["id", "zero", "id-int"]);
}

#[test]
fn program_records_package_and_file() {
    let program = parse_program_with("(define x 1)", "main.kiln", "app", &NoMacros).unwrap();
    assert_eq!(program.package, "app");
    assert_eq!(program.file, "main.kiln");
}

// ── Attributes ─────────────────────────────────────────────────────────

#[test]
fn monomorphize_attaches_to_next_define() {
    let forms = read("(monomorphize) (define (f x) x)").unwrap();
    let mut parser = ToplevelParser::new(Program::default(), &NoMacros);

    assert!(!parser.parse_form(&forms[0]).unwrap());
    assert_eq!(parser.pending().len(), 1);
    assert!(parser.parse_form(&forms[1]).unwrap());
    assert!(parser.pending().is_empty());

    let program = parser.finish().unwrap();
    assert_eq!(program.defines.len(), 1);
    assert_eq!(program.defines[0].name.name, "f");
    assert!(program.defines[0].monomorphize.is_some());
}

#[test]
fn monomorphize_attaches_to_declare() {
    let program = parse("(monomorphize) (declare f (Integer -> Integer)) (define (f x) x)").unwrap();
    assert!(program.declares[0].monomorphize.is_some());
    assert!(program.defines[0].monomorphize.is_none());
}

#[test]
fn duplicate_monomorphize_is_rejected() {
    let source = "(monomorphize) (monomorphize) (define (f x) x)";
    let err = parse(source).unwrap_err();
    assert_eq!(err.message, "duplicate `monomorphize` attribute");
    assert_eq!(&source[err.span.range()], "(monomorphize)");
    assert_eq!(err.span.start, 15);
    assert_eq!(err.notes[0].message, "previous attribute here");
}

#[test]
fn orphan_attribute_at_end_of_input() {
    let err = parse("(define x 1) (monomorphize)").unwrap_err();
    assert_eq!(err.message, "orphan `monomorphize` attribute");
    assert_eq!(err.span.start, 13);
}

#[test]
fn repr_cannot_target_a_class() {
    let err = parse("(repr :enum) (define-class (C :a) (m (:a -> :a)))").unwrap_err();
    assert_eq!(err.message, "invalid target for `repr` attribute");
    assert!(err.notes[0].message.contains("define-class"));
}

#[test]
fn repr_cannot_target_a_define() {
    let err = parse("(repr :lisp) (define x 1)").unwrap_err();
    assert_eq!(err.message, "invalid target for `repr` attribute");
}

#[test]
fn monomorphize_cannot_target_a_type() {
    let err = parse("(monomorphize) (define-type Unit Unit)").unwrap_err();
    assert_eq!(err.message, "invalid target for `monomorphize` attribute");
}

#[test]
fn native_repr_records_host_type() {
    let program = parse("(repr :native (Vec u8)) (define-type Bytes)").unwrap();
    let repr = program.types[0].repr.as_ref().unwrap();
    let ReprKind::Native(host) = &repr.kind else {
        panic!("expected native repr, got {:?}", repr.kind);
    };
    assert_eq!(host.to_string(), "(Vec u8)");
}

#[test]
fn native_repr_requires_argument() {
    let err = parse("(repr :native) (define-type Bytes)").unwrap_err();
    assert_eq!(err.message, "missing native type");
}

#[test]
fn duplicate_repr_is_rejected() {
    let err = parse("(repr :enum) (repr :lisp) (define-type Color Red)").unwrap_err();
    assert_eq!(err.message, "duplicate `repr` attribute");
}

// ── progn ──────────────────────────────────────────────────────────────

#[test]
fn progn_is_flattened() {
    let program = parse("(progn (define x 1) (progn (define y 2)))").unwrap();
    let names: Vec<&str> = program.defines.iter().map(|d| d.name.name.as_str()).collect();
    assert_eq!(names, ["x", "y"]);
}

#[test]
fn progn_shares_the_pending_buffer() {
    let program = parse("(monomorphize) (progn (define (f x) x))").unwrap();
    assert!(program.defines[0].monomorphize.is_some());
}

#[test]
fn orphan_attribute_at_end_of_progn() {
    let err = parse("(progn (define x 1) (monomorphize)) (define (f x) x)").unwrap_err();
    assert_eq!(err.message, "orphan `monomorphize` attribute");
    assert_eq!(err.notes[0].message, "at the end of this progn");
}

// ── Macros ─────────────────────────────────────────────────────────────

fn macros() -> MacroTable {
    let mut table = MacroTable::new();
    // (defvar name value) => (define name value)
    table.register("defvar", |form| {
        let mut items = form.items().to_vec();
        items[0] = Cst::symbol("define", items[0].span());
        Ok(Cst::list(items, form.span()))
    });
    // (alias-of-defvar ...) => (defvar ...)
    table.register("alias-of-defvar", |form| {
        let mut items = form.items().to_vec();
        items[0] = Cst::symbol("defvar", items[0].span());
        Ok(Cst::list(items, form.span()))
    });
    table.register("forever", |form| Ok(form.clone()));
    // (again) => (progn (again))
    table.register("again", |form| {
        Ok(Cst::list(
            vec![Cst::symbol("progn", form.span()), form.clone()],
            form.span(),
        ))
    });
    table
}

#[test]
fn macros_expand_until_classified() {
    let forms = read("(alias-of-defvar x 1)").unwrap();
    let program = parse_forms(&forms, Program::default(), &macros()).unwrap();
    assert_eq!(program.defines[0].name.name, "x");
}

#[test]
fn errors_inside_expansions_are_noted() {
    let forms = read("(defvar x)").unwrap();
    let err = parse_forms(&forms, Program::default(), &macros()).unwrap_err();
    assert_eq!(err.message, "missing body");
    let last = err.notes.last().unwrap();
    assert_eq!(last.message, "in expansion of macro `defvar`");
}

#[test]
fn runaway_expansion_is_bounded() {
    let forms = read("(forever)").unwrap();
    let err = parse_forms(&forms, Program::default(), &macros()).unwrap_err();
    assert!(err.message.contains("exceeded the expansion limit"));
}

#[test]
fn expansion_through_progn_is_bounded() {
    let forms = read("(again)").unwrap();
    let err = parse_forms(&forms, Program::default(), &macros()).unwrap_err();
    assert_eq!(
        err.message,
        format!("macro `again` exceeded the expansion limit of {MAX_EXPANSION_DEPTH}")
    );
}

#[test]
fn unknown_head_is_invalid() {
    let err = parse("(frobnicate x)").unwrap_err();
    assert_eq!(err.message, "invalid toplevel form");
    assert_eq!(
        err.help.as_deref(),
        Some("`frobnicate` is not a toplevel keyword or a known macro")
    );
}

// ── Shapes ─────────────────────────────────────────────────────────────

#[test]
fn instance_end_to_end() {
    let program =
        parse("(define-instance (Eq Integer) (define (== a b) (internal-eq a b)))").unwrap();
    assert_eq!(program.instances.len(), 1);
    let instance = &program.instances[0];
    assert!(instance.context.is_empty());
    assert_eq!(instance.predicate.to_string(), "Eq Integer");
    assert_eq!(instance.methods.len(), 1);
    assert_eq!(instance.methods[0].name.name, "==");
    assert_eq!(instance.methods[0].params.len(), 2);
    assert!(!instance.compiler_generated);
}

#[test]
fn fundeps_in_class_heads() {
    let program = parse("(define-class (Z :a :b (:a -> :b)))").unwrap();
    let class = &program.classes[0];
    assert_eq!(class.vars.len(), 2);
    assert_eq!(class.fundeps.len(), 1);

    let program = parse("(define-class (Z (:a -> :b)))").unwrap();
    assert!(program.classes[0].vars.is_empty());
    assert_eq!(program.classes[0].fundeps[0].left[0].name, ":a");
    assert_eq!(program.classes[0].fundeps[0].right[0].name, ":b");
}

#[test]
fn class_head_degenerate_separators() {
    let source = "(define-class (=> C :a))";
    let err = parse(source).unwrap_err();
    assert_eq!(err.message, "unnecessary `=>`");
    assert_eq!(err.suggestions[0].apply(source), "(define-class ( C :a))");

    let err = parse("(define-class (Eq :a => ))").unwrap_err();
    assert_eq!(err.message, "missing class name");
}

#[test]
fn nullary_define_has_wildcard_param() {
    let program = parse("(define (main) 1)").unwrap();
    let define = &program.defines[0];
    assert!(matches!(define.params[..], [Pattern::Wildcard(_)]));
    assert!(define.orig_params.is_empty());
}

#[test]
fn attributes_are_values() {
    let forms = read("(repr :transparent)").unwrap();
    let mut parser = ToplevelParser::new(Program::default(), &NoMacros);
    parser.parse_form(&forms[0]).unwrap();
    assert!(matches!(
        parser.pending(),
        [Attribute::Repr(repr)] if repr.kind == ReprKind::Transparent
    ));
}
