//! Type predicates and qualified types.
//!
//! A [`TypePredicate`] is the constraint "these types belong to this
//! class". A [`QualifiedType`] is a type that holds given a list of such
//! constraints. Both are plain values: every operation here is pure and
//! returns a new value.

use std::fmt;

use crate::subst::Substitution;
use crate::ty::{Kind, Position, PrintOptions, Ty, TyDisplay, TyVar};

/// Structural operations shared by everything that contains types.
pub trait Types: Sized {
    /// Replace inference variables according to `subst`.
    fn substitute(&self, subst: &Substitution) -> Self;

    /// Append free inference variables not already in `out`.
    fn collect_free(&self, out: &mut Vec<TyVar>);

    /// Replace each quantified variable `Gen(i)` with `fresh[i]`.
    ///
    /// Panics if a `Gen` index is out of range: schemes are always
    /// instantiated with exactly as many types as they quantify.
    fn instantiate(&self, fresh: &[Ty]) -> Self;

    /// Free inference variables, without duplicates, in order of first
    /// occurrence.
    fn free_type_variables(&self) -> Vec<TyVar> {
        let mut out = Vec::new();
        self.collect_free(&mut out);
        out
    }
}

impl Types for Ty {
    fn substitute(&self, subst: &Substitution) -> Ty {
        match self {
            Ty::Var(v) => subst.get(*v).cloned().unwrap_or(Ty::Var(*v)),
            Ty::Con(_) | Ty::Gen(_) => self.clone(),
            Ty::App(a, b) => Ty::app(a.substitute(subst), b.substitute(subst)),
            Ty::Fun(a, b) => Ty::fun(a.substitute(subst), b.substitute(subst)),
        }
    }

    fn collect_free(&self, out: &mut Vec<TyVar>) {
        self.collect_vars(out);
    }

    fn instantiate(&self, fresh: &[Ty]) -> Ty {
        match self {
            Ty::Gen(i) => match fresh.get(*i as usize) {
                Some(ty) => ty.clone(),
                None => panic!(
                    "instantiating `Gen({i})` with only {} fresh types",
                    fresh.len()
                ),
            },
            Ty::Var(_) | Ty::Con(_) => self.clone(),
            Ty::App(a, b) => Ty::app(a.instantiate(fresh), b.instantiate(fresh)),
            Ty::Fun(a, b) => Ty::fun(a.instantiate(fresh), b.instantiate(fresh)),
        }
    }
}

impl<T: Types> Types for Vec<T> {
    fn substitute(&self, subst: &Substitution) -> Self {
        self.iter().map(|t| t.substitute(subst)).collect()
    }

    fn collect_free(&self, out: &mut Vec<TyVar>) {
        for t in self {
            t.collect_free(out);
        }
    }

    fn instantiate(&self, fresh: &[Ty]) -> Self {
        self.iter().map(|t| t.instantiate(fresh)).collect()
    }
}

// ── TypePredicate ──────────────────────────────────────────────────────

/// `C t1 .. tn`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypePredicate {
    pub class: String,
    pub types: Vec<Ty>,
}

impl TypePredicate {
    pub fn new(class: impl Into<String>, types: Vec<Ty>) -> Self {
        TypePredicate {
            class: class.into(),
            types,
        }
    }

    /// True iff no argument type contains a variable. Static predicates
    /// can be resolved without generalization.
    pub fn is_static(&self) -> bool {
        !self.types.iter().any(Ty::has_variables)
    }

    /// Head normal form: some argument is headed by a variable.
    pub fn in_hnf(&self) -> bool {
        self.types.iter().any(Ty::is_var_headed)
    }

    pub fn display(&self, opts: PrintOptions) -> PredicateDisplay<'_> {
        PredicateDisplay { pred: self, opts }
    }
}

impl Types for TypePredicate {
    fn substitute(&self, subst: &Substitution) -> Self {
        TypePredicate {
            class: self.class.clone(),
            types: self.types.substitute(subst),
        }
    }

    fn collect_free(&self, out: &mut Vec<TyVar>) {
        self.types.collect_free(out);
    }

    fn instantiate(&self, fresh: &[Ty]) -> Self {
        TypePredicate {
            class: self.class.clone(),
            types: self.types.instantiate(fresh),
        }
    }
}

pub struct PredicateDisplay<'a> {
    pred: &'a TypePredicate,
    opts: PrintOptions,
}

impl fmt::Display for PredicateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pred.class)?;
        for ty in &self.pred.types {
            write!(f, " {}", TyDisplay::at(ty, self.opts, Position::AppArg))?;
        }
        Ok(())
    }
}

impl fmt::Display for TypePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display(PrintOptions::ASCII))
    }
}

// ── QualifiedType ──────────────────────────────────────────────────────

/// `preds => ty`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    pub predicates: Vec<TypePredicate>,
    pub ty: Ty,
}

impl QualifiedType {
    pub fn new(predicates: Vec<TypePredicate>, ty: Ty) -> Self {
        QualifiedType { predicates, ty }
    }

    pub fn unqualified(ty: Ty) -> Self {
        QualifiedType {
            predicates: Vec::new(),
            ty,
        }
    }

    /// The kind of the underlying type. Predicates do not affect it.
    pub fn kind(&self) -> Option<Kind> {
        self.ty.kind()
    }

    pub fn display(&self, opts: PrintOptions) -> QualifiedDisplay<'_> {
        QualifiedDisplay { qual: self, opts }
    }
}

impl Types for QualifiedType {
    fn substitute(&self, subst: &Substitution) -> Self {
        QualifiedType {
            predicates: self.predicates.substitute(subst),
            ty: self.ty.substitute(subst),
        }
    }

    fn collect_free(&self, out: &mut Vec<TyVar>) {
        self.predicates.collect_free(out);
        self.ty.collect_free(out);
    }

    fn instantiate(&self, fresh: &[Ty]) -> Self {
        QualifiedType {
            predicates: self.predicates.instantiate(fresh),
            ty: self.ty.instantiate(fresh),
        }
    }
}

pub struct QualifiedDisplay<'a> {
    qual: &'a QualifiedType,
    opts: PrintOptions,
}

impl fmt::Display for QualifiedDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = self.opts;
        let ty = self.qual.ty.display(opts);
        match &self.qual.predicates[..] {
            [] => write!(f, "{ty}"),
            [pred] => write!(f, "{} {} {ty}", pred.display(opts), opts.implies()),
            preds => {
                for pred in preds {
                    write!(f, "({}) ", pred.display(opts))?;
                }
                write!(f, "{} {ty}", opts.implies())
            }
        }
    }
}

impl fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display(PrintOptions::ASCII))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(ty: Ty) -> TypePredicate {
        TypePredicate::new("Eq", vec![ty])
    }

    #[test]
    fn substitution_replaces_every_occurrence() {
        let v = TyVar(0);
        let pred = TypePredicate::new(
            "Convert",
            vec![Ty::Var(v), Ty::list(Ty::Var(v)), Ty::Var(TyVar(1))],
        );
        let subst = Substitution::singleton(v, Ty::integer());
        let out = pred.substitute(&subst);
        assert_eq!(out.class, "Convert");
        assert_eq!(out.types.len(), 3);
        assert!(!out.free_type_variables().contains(&v));
        assert_eq!(out.to_string(), "Convert Integer (List Integer) ?1");
    }

    #[test]
    fn free_variables_of_qualified_type() {
        let q = QualifiedType::new(
            vec![eq(Ty::Var(TyVar(2)))],
            Ty::fun(Ty::Var(TyVar(1)), Ty::Var(TyVar(2))),
        );
        assert_eq!(q.free_type_variables(), [TyVar(2), TyVar(1)]);
    }

    #[test]
    fn instantiate_by_position() {
        let q = QualifiedType::new(vec![eq(Ty::Gen(0))], Ty::fun(Ty::Gen(0), Ty::Gen(1)));
        let out = q.instantiate(&[Ty::Var(TyVar(7)), Ty::boolean()]);
        assert_eq!(out.to_string(), "Eq ?7 => ?7 -> Boolean");
    }

    #[test]
    #[should_panic(expected = "instantiating `Gen(1)`")]
    fn instantiate_arity_mismatch_panics() {
        Ty::Gen(1).instantiate(&[Ty::integer()]);
    }

    #[test]
    fn static_predicates() {
        assert!(eq(Ty::list(Ty::integer())).is_static());
        assert!(!eq(Ty::list(Ty::Var(TyVar(0)))).is_static());
        assert!(!eq(Ty::Gen(0)).is_static());
    }

    #[test]
    fn qualified_kind_ignores_predicates() {
        let q = QualifiedType::new(vec![eq(Ty::Gen(0))], Ty::list(Ty::Gen(0)));
        assert_eq!(q.kind(), Some(Kind::Star));
    }
}
