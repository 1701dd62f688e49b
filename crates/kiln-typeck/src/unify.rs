//! Unification engine for Hindley-Milner type inference.
//!
//! Implements unification on `ena`'s union-find table, with the occurs
//! check and level-based generalization: every variable records the
//! let-nesting level it was created at, and binding a variable pulls the
//! levels of everything it is bound to down to its own.

use ena::unify::InPlaceUnificationTable;

use crate::error::{ConstraintOrigin, TypeError};
use crate::predicate::{QualifiedType, TypePredicate};
use crate::ty::{Scheme, Ty, TyVar};

/// The inference context: owns the unification table, level state and
/// the errors produced by unification.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    current_level: u32,
    /// Level of each variable, indexed by `TyVar.0`. Only meaningful for
    /// root keys.
    var_levels: Vec<u32>,
    pub errors: Vec<TypeError>,
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            current_level: 0,
            var_levels: Vec::new(),
            errors: Vec::new(),
        }
    }

    // ── Type Variable Creation ──────────────────────────────────────────

    /// Create a fresh type variable at the current level.
    pub fn fresh_var(&mut self) -> Ty {
        let var = self.table.new_key(None);
        if self.var_levels.len() <= var.0 as usize {
            self.var_levels.resize(var.0 as usize + 1, 0);
        }
        self.var_levels[var.0 as usize] = self.current_level;
        Ty::Var(var)
    }

    pub fn fresh_vars(&mut self, n: u32) -> Vec<Ty> {
        (0..n).map(|_| self.fresh_var()).collect()
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection all the way
    /// down. Unbound variables are normalized to their root key.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::App(a, b) => {
                let a = self.resolve(*a);
                let b = self.resolve(*b);
                Ty::app(a, b)
            }
            Ty::Fun(a, b) => {
                let a = self.resolve(*a);
                let b = self.resolve(*b);
                Ty::fun(a, b)
            }
            other => other,
        }
    }

    pub fn resolve_predicate(&mut self, pred: &TypePredicate) -> TypePredicate {
        TypePredicate {
            class: pred.class.clone(),
            types: pred.types.iter().map(|t| self.resolve(t.clone())).collect(),
        }
    }

    // ── Occurs Check ────────────────────────────────────────────────────

    /// Check if a type variable occurs anywhere within a type.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.find(*v) == self.table.find(var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Con(_) | Ty::Gen(_) => false,
            Ty::App(a, b) | Ty::Fun(a, b) => self.occurs_in(var, a) || self.occurs_in(var, b),
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// Both types are first resolved through the union-find table, then
    /// structurally compared. On failure the error is recorded in
    /// `errors` and also returned.
    pub fn unify(&mut self, a: Ty, b: Ty, origin: ConstraintOrigin) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        match self.unify_resolved(a.clone(), b.clone(), &origin) {
            Ok(()) => Ok(()),
            Err(mut err) => {
                // Report the whole types rather than the innermost parts.
                if let TypeError::Mismatch {
                    expected, found, ..
                } = &mut err
                {
                    *expected = self.resolve(a);
                    *found = self.resolve(b);
                }
                self.errors.push(err.clone());
                Err(err)
            }
        }
    }

    fn unify_resolved(&mut self, a: Ty, b: Ty, origin: &ConstraintOrigin) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => {
                let level = self.level_of(v1).min(self.level_of(v2));
                self.table
                    .unify_var_var(v1, v2)
                    .expect("unifying two unbound vars should not fail");
                let root = self.table.find(v1);
                self.var_levels[root.0 as usize] = level;
                Ok(())
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(TypeError::InfiniteType {
                        var: v,
                        ty,
                        origin: origin.clone(),
                    });
                }
                let level = self.level_of(v);
                for u in ty.vars() {
                    let root = self.table.find(u);
                    let slot = &mut self.var_levels[root.0 as usize];
                    *slot = (*slot).min(level);
                }
                self.table
                    .unify_var_value(v, Some(ty))
                    .expect("binding a var to a type after occurs check should not fail");
                Ok(())
            }

            (Ty::Con(c1), Ty::Con(c2)) if c1 == c2 => Ok(()),
            (Ty::Gen(i), Ty::Gen(j)) if i == j => Ok(()),

            (Ty::App(f1, a1), Ty::App(f2, a2)) | (Ty::Fun(f1, a1), Ty::Fun(f2, a2)) => {
                self.unify_resolved(*f1, *f2, origin)?;
                self.unify_resolved(*a1, *a2, origin)
            }

            (a, b) => Err(TypeError::Mismatch {
                expected: a,
                found: b,
                origin: origin.clone(),
            }),
        }
    }

    // ── Level Management ────────────────────────────────────────────────

    /// Enter a new let-binding level.
    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    /// Leave the current let-binding level.
    pub fn leave_level(&mut self) {
        debug_assert!(self.current_level > 0, "cannot leave level 0");
        self.current_level -= 1;
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// The level of an unbound variable's equivalence class.
    pub fn level_of(&mut self, var: TyVar) -> u32 {
        let root = self.table.find(var);
        self.var_levels.get(root.0 as usize).copied().unwrap_or(0)
    }

    // ── Generalization ──────────────────────────────────────────────────

    /// Unbound variables of `ty` that were introduced at a deeper level
    /// than the current one, in order of first occurrence.
    pub fn generalizable_vars(&mut self, ty: &Ty) -> Vec<TyVar> {
        let resolved = self.resolve(ty.clone());
        resolved
            .vars()
            .into_iter()
            .filter(|v| self.level_of(*v) > self.current_level)
            .collect()
    }

    /// Instantiate a scheme with fresh variables at the current level.
    pub fn instantiate(&mut self, scheme: &Scheme) -> QualifiedType {
        let fresh = self.fresh_vars(scheme.quantified);
        scheme.instantiate(&fresh)
    }
}
