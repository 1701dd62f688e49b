//! Pure substitutions, most general unifiers and one-way matching.
//!
//! Inference itself runs on the mutable `ena` table in
//! [`crate::unify`]. The pure forms here are used where types must be
//! compared without touching that table: instance overlap checks,
//! instance lookup, generalization and defaulting.

use rustc_hash::FxHashMap;

use crate::predicate::Types;
use crate::ty::{Ty, TyVar};

/// A finite map from inference variables to types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    map: FxHashMap<TyVar, Ty>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: TyVar, ty: Ty) -> Self {
        let mut s = Self::new();
        s.insert(var, ty);
        s
    }

    pub fn insert(&mut self, var: TyVar, ty: Ty) {
        self.map.insert(var, ty);
    }

    pub fn get(&self, var: TyVar) -> Option<&Ty> {
        self.map.get(&var)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TyVar, &Ty)> {
        self.map.iter()
    }

    /// `self ∘ other`: apply `other`, then `self`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut map: FxHashMap<TyVar, Ty> = other
            .map
            .iter()
            .map(|(v, t)| (*v, t.substitute(self)))
            .collect();
        for (v, t) in &self.map {
            map.entry(*v).or_insert_with(|| t.clone());
        }
        Substitution { map }
    }
}

impl FromIterator<(TyVar, Ty)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (TyVar, Ty)>>(iter: I) -> Self {
        Substitution {
            map: iter.into_iter().collect(),
        }
    }
}

/// Why two types failed to unify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnifyFailure {
    Mismatch(Ty, Ty),
    Occurs(TyVar, Ty),
}

/// The most general unifier of `a` and `b`.
///
/// Quantified variables (`Gen`) are treated as rigid constants.
pub fn mgu(a: &Ty, b: &Ty) -> Result<Substitution, UnifyFailure> {
    match (a, b) {
        (Ty::Var(v), t) | (t, Ty::Var(v)) => bind(*v, t),
        (Ty::App(f1, a1), Ty::App(f2, a2)) | (Ty::Fun(f1, a1), Ty::Fun(f2, a2)) => {
            let s1 = mgu(f1, f2)?;
            let s2 = mgu(&a1.substitute(&s1), &a2.substitute(&s1))?;
            Ok(s2.compose(&s1))
        }
        (Ty::Con(c1), Ty::Con(c2)) if c1 == c2 => Ok(Substitution::new()),
        (Ty::Gen(i), Ty::Gen(j)) if i == j => Ok(Substitution::new()),
        _ => Err(UnifyFailure::Mismatch(a.clone(), b.clone())),
    }
}

/// Unify two type lists position by position.
pub fn mgu_all(a: &[Ty], b: &[Ty]) -> Result<Substitution, UnifyFailure> {
    let mut subst = Substitution::new();
    for (x, y) in a.iter().zip(b) {
        let s = mgu(&x.substitute(&subst), &y.substitute(&subst))?;
        subst = s.compose(&subst);
    }
    Ok(subst)
}

fn bind(var: TyVar, ty: &Ty) -> Result<Substitution, UnifyFailure> {
    match ty {
        Ty::Var(v) if *v == var => Ok(Substitution::new()),
        _ if ty.vars().contains(&var) => Err(UnifyFailure::Occurs(var, ty.clone())),
        _ => Ok(Substitution::singleton(var, ty.clone())),
    }
}

/// One-way matching of a quantified `pattern` against `target`.
///
/// Only the pattern's `Gen` variables bind; everything in `target`,
/// including inference variables, is rigid. `bindings[i]` holds the type
/// bound to `Gen(i)` so far.
pub fn match_type(pattern: &Ty, target: &Ty, bindings: &mut [Option<Ty>]) -> bool {
    match (pattern, target) {
        (Ty::Gen(i), _) => match bindings.get_mut(*i as usize) {
            Some(Some(bound)) => *bound == *target,
            Some(slot) => {
                *slot = Some(target.clone());
                true
            }
            None => false,
        },
        (Ty::App(f1, a1), Ty::App(f2, a2)) | (Ty::Fun(f1, a1), Ty::Fun(f2, a2)) => {
            match_type(f1, f2, bindings) && match_type(a1, a2, bindings)
        }
        (Ty::Con(c1), Ty::Con(c2)) => c1 == c2,
        (Ty::Var(v1), Ty::Var(v2)) => v1 == v2,
        _ => false,
    }
}

/// Match several pattern/target pairs with shared bindings.
pub fn match_types(patterns: &[Ty], targets: &[Ty], quantified: u32) -> Option<Vec<Option<Ty>>> {
    if patterns.len() != targets.len() {
        return None;
    }
    let mut bindings = vec![None; quantified as usize];
    patterns
        .iter()
        .zip(targets)
        .all(|(p, t)| match_type(p, t, &mut bindings))
        .then_some(bindings)
}

/// Replace `Gen(i)` with `Var(offset + i)`, so two quantified types can be
/// unified without their variables colliding.
pub fn gens_to_vars(ty: &Ty, offset: u32) -> Ty {
    match ty {
        Ty::Gen(i) => Ty::Var(TyVar(offset + i)),
        Ty::Var(_) | Ty::Con(_) => ty.clone(),
        Ty::App(a, b) => Ty::app(gens_to_vars(a, offset), gens_to_vars(b, offset)),
        Ty::Fun(a, b) => Ty::fun(gens_to_vars(a, offset), gens_to_vars(b, offset)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(n: u32) -> Ty {
        Ty::Var(TyVar(n))
    }

    #[test]
    fn compose_applies_left_after_right() {
        let s1 = Substitution::singleton(TyVar(1), Ty::integer());
        let s2 = Substitution::singleton(TyVar(0), Ty::list(var(1)));
        let s = s1.compose(&s2);
        assert_eq!(var(0).substitute(&s), Ty::list(Ty::integer()));
        assert_eq!(var(1).substitute(&s), Ty::integer());
    }

    #[test]
    fn mgu_unifies_structurally() {
        let a = Ty::fun(var(0), Ty::list(var(1)));
        let b = Ty::fun(Ty::integer(), Ty::list(var(0)));
        let s = mgu(&a, &b).unwrap();
        assert_eq!(a.substitute(&s), b.substitute(&s));
        assert_eq!(var(1).substitute(&s), Ty::integer());
    }

    #[test]
    fn mgu_occurs_check() {
        let err = mgu(&var(0), &Ty::list(var(0))).unwrap_err();
        assert!(matches!(err, UnifyFailure::Occurs(TyVar(0), _)));
    }

    #[test]
    fn mgu_treats_gens_as_rigid() {
        assert!(mgu(&Ty::Gen(0), &Ty::integer()).is_err());
        assert!(mgu(&Ty::Gen(0), &Ty::Gen(0)).unwrap().is_empty());
    }

    #[test]
    fn matching_binds_only_pattern_gens() {
        let pattern = Ty::list(Ty::Gen(0));
        let bindings = match_types(&[pattern.clone()], &[Ty::list(Ty::integer())], 1).unwrap();
        assert_eq!(bindings, [Some(Ty::integer())]);

        // An inference variable in the target does not match a constructor.
        assert!(match_types(&[Ty::list(Ty::integer())], &[Ty::list(var(0))], 0).is_none());
        // A variable target still matches a bare generic pattern.
        assert!(match_types(&[Ty::Gen(0)], &[var(3)], 1).is_some());
    }

    #[test]
    fn matching_requires_consistent_bindings() {
        let pair = Ty::fun(Ty::Gen(0), Ty::Gen(0));
        assert!(match_types(&[pair.clone()], &[Ty::fun(Ty::integer(), Ty::integer())], 1).is_some());
        assert!(match_types(&[pair], &[Ty::fun(Ty::integer(), Ty::string())], 1).is_none());
    }
}
