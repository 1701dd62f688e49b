//! Reader integration tests: source text to lossless tree to owned forms.

use insta::assert_snapshot;
use kiln_parser::{debug_tree, read, read_tree, Atom, Cst};

#[test]
fn debug_tree_keeps_trivia() {
    let parse = read_tree("(f :a) ; c");
    assert!(parse.ok());
    assert_snapshot!(debug_tree(&parse.syntax()), @r#"
    ROOT@0..10
      LIST@0..6
        L_PAREN@0..1 "("
        ATOM@1..2
          SYMBOL@1..2 "f"
        WHITESPACE@2..3 " "
        ATOM@3..5
          SYMBOL@3..5 ":a"
        R_PAREN@5..6 ")"
      WHITESPACE@6..7 " "
      COMMENT@7..10 "; c"
    "#);
}

#[test]
fn forms_carry_source_spans() {
    let source = "(define (f x)\n  (+ x 1))";
    let forms = read(source).unwrap();
    assert_eq!(forms.len(), 1);
    let body = &forms[0].items()[2];
    assert_eq!(&source[body.span().range()], "(+ x 1)");
}

#[test]
fn atoms_are_decoded() {
    let forms = read(r#"12 -3 1.5 "a\nb" sym"#).unwrap();
    let atoms: Vec<&Atom> = forms.iter().filter_map(Cst::atom).collect();
    assert_eq!(
        atoms,
        [
            &Atom::Integer(12),
            &Atom::Integer(-3),
            &Atom::Float(1.5),
            &Atom::String("a\nb".into()),
            &Atom::Symbol("sym".into()),
        ]
    );
}

#[test]
fn cst_prints_back_as_sexpr() {
    let forms = read("(define-type (List :a)  (Cons :a (List :a))   Nil)").unwrap();
    assert_eq!(
        forms[0].to_string(),
        "(define-type (List :a) (Cons :a (List :a)) Nil)"
    );
}
