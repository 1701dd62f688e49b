//! Class registry, instance lookup and predicate solving.
//!
//! Classes and instances are stored with their variables quantified
//! (`Gen(i)`), so looking up an instance for a predicate is one-way
//! matching rather than unification. On top of lookup this module provides
//! entailment, context reduction, fundep improvement and the default table
//! used to resolve ambiguous predicates.

use rustc_hash::FxHashMap;

use kiln_common::span::Span;

use crate::error::ConstraintOrigin;
use crate::predicate::{TypePredicate, Types};
use crate::subst::{gens_to_vars, match_types, mgu_all};
use crate::ty::Ty;
use crate::unify::InferCtx;

/// Reduction gives up on instance chains deeper than this.
const MAX_REDUCTION_DEPTH: usize = 64;

/// A functional dependency between class parameter positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fundep {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

/// A class definition.
#[derive(Clone, Debug)]
pub struct Class {
    pub name: String,
    /// Names of the class variables, for printing. The `i`th is `Gen(i)`
    /// in `superclasses`.
    pub vars: Vec<String>,
    pub superclasses: Vec<TypePredicate>,
    pub fundeps: Vec<Fundep>,
    /// Method names in declaration order.
    pub methods: Vec<String>,
    pub span: Option<Span>,
}

impl Class {
    pub fn arity(&self) -> usize {
        self.vars.len()
    }
}

/// An instance: `forall gens. context => head`.
#[derive(Clone, Debug)]
pub struct Instance {
    pub quantified: u32,
    pub context: Vec<TypePredicate>,
    pub head: TypePredicate,
    pub span: Option<Span>,
    pub compiler_generated: bool,
}

impl Instance {
    /// The head with its quantified variables turned into inference
    /// variables numbered from `offset`, for unifying two instance heads.
    fn head_as_vars(&self, offset: u32) -> Vec<Ty> {
        self.head
            .types
            .iter()
            .map(|t| gens_to_vars(t, offset))
            .collect()
    }
}

/// Why a predicate could not be reduced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsatisfied(pub TypePredicate);

/// The class environment.
#[derive(Clone, Debug, Default)]
pub struct ClassEnv {
    classes: FxHashMap<String, Class>,
    /// Instances keyed by class name.
    instances: FxHashMap<String, Vec<Instance>>,
    /// Candidate types for defaulting, keyed by class name, in order of
    /// preference.
    defaults: FxHashMap<String, Vec<Ty>>,
}

impl ClassEnv {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ────────────────────────────────────────────────────

    pub fn add_class(&mut self, class: Class) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    pub fn add_instance(&mut self, instance: Instance) {
        self.instances
            .entry(instance.head.class.clone())
            .or_default()
            .push(instance);
    }

    pub fn instances(&self, class: &str) -> &[Instance] {
        self.instances.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_defaults(&mut self, class: impl Into<String>, candidates: Vec<Ty>) {
        self.defaults.insert(class.into(), candidates);
    }

    pub fn defaults(&self, class: &str) -> &[Ty] {
        self.defaults.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    // ── Instance validation ─────────────────────────────────────────────

    /// An existing instance whose head unifies with `candidate`'s.
    pub fn overlapping(&self, candidate: &Instance) -> Option<&Instance> {
        let offset = candidate.quantified;
        let new_head = candidate.head_as_vars(0);
        self.instances(&candidate.head.class)
            .iter()
            .find(|existing| mgu_all(&new_head, &existing.head_as_vars(offset)).is_ok())
    }

    /// An existing instance that agrees with `candidate` on the
    /// determining positions of some fundep but not on the determined ones.
    pub fn fundep_conflict(&self, candidate: &Instance) -> Option<&Instance> {
        let class = self.class(&candidate.head.class)?;
        let offset = candidate.quantified;
        let new_head = candidate.head_as_vars(0);
        self.instances(&candidate.head.class).iter().find(|existing| {
            let old_head = existing.head_as_vars(offset);
            class.fundeps.iter().any(|fd| {
                let pick = |head: &[Ty], positions: &[usize]| -> Vec<Ty> {
                    positions.iter().map(|&i| head[i].clone()).collect()
                };
                let Ok(subst) = mgu_all(&pick(&new_head, &fd.left), &pick(&old_head, &fd.left))
                else {
                    return false;
                };
                let new_right = pick(&new_head, &fd.right).substitute(&subst);
                let old_right = pick(&old_head, &fd.right).substitute(&subst);
                new_right != old_right
            })
        })
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// The instance matching `pred`, together with the types its
    /// quantified variables were bound to.
    pub fn matching_instance(&self, pred: &TypePredicate) -> Option<(&Instance, Vec<Ty>)> {
        self.instances(&pred.class).iter().find_map(|inst| {
            let bindings = match_types(&inst.head.types, &pred.types, inst.quantified)?;
            // Every instance variable occurs in the head, so all are bound.
            let types: Option<Vec<Ty>> = bindings.into_iter().collect();
            Some((inst, types?))
        })
    }

    /// The context an instance requires for `pred` to hold.
    pub fn by_instance(&self, pred: &TypePredicate) -> Option<Vec<TypePredicate>> {
        self.matching_instance(pred)
            .map(|(inst, types)| inst.context.instantiate(&types))
    }

    /// Direct superclasses of `pred`, at `pred`'s types.
    pub fn superclasses(&self, pred: &TypePredicate) -> Vec<TypePredicate> {
        match self.class(&pred.class) {
            Some(class) if class.arity() == pred.types.len() => {
                class.superclasses.instantiate(&pred.types)
            }
            _ => Vec::new(),
        }
    }

    /// `pred` and everything it implies through superclasses.
    pub fn super_closure(&self, pred: &TypePredicate) -> Vec<TypePredicate> {
        let mut out = vec![pred.clone()];
        let mut i = 0;
        while i < out.len() {
            for sup in self.superclasses(&out[i]) {
                if !out.contains(&sup) {
                    out.push(sup);
                }
            }
            i += 1;
        }
        out
    }

    /// Whether `pred` follows from `given` through superclasses and
    /// instances.
    pub fn entails(&self, given: &[TypePredicate], pred: &TypePredicate) -> bool {
        self.entails_at(given, pred, 0)
    }

    fn entails_at(&self, given: &[TypePredicate], pred: &TypePredicate, depth: usize) -> bool {
        if depth > MAX_REDUCTION_DEPTH {
            return false;
        }
        if given.iter().any(|g| self.super_closure(g).contains(pred)) {
            return true;
        }
        match self.by_instance(pred) {
            Some(context) => context
                .iter()
                .all(|p| self.entails_at(given, p, depth + 1)),
            None => false,
        }
    }

    // ── Context reduction ───────────────────────────────────────────────

    /// Reduce a predicate set: replace predicates that an instance
    /// resolves by that instance's context, keep the rest if they are in
    /// head normal form, then drop whatever the others imply.
    ///
    /// A predicate with no instance that is not in head normal form can
    /// never be satisfied and is returned as the error.
    pub fn reduce(&self, preds: &[TypePredicate]) -> Result<Vec<TypePredicate>, Unsatisfied> {
        let mut hnf = Vec::new();
        for pred in preds {
            self.to_hnf(pred, 0, &mut hnf)?;
        }
        Ok(self.simplify(hnf))
    }

    fn to_hnf(
        &self,
        pred: &TypePredicate,
        depth: usize,
        out: &mut Vec<TypePredicate>,
    ) -> Result<(), Unsatisfied> {
        if depth > MAX_REDUCTION_DEPTH {
            return Err(Unsatisfied(pred.clone()));
        }
        if let Some(context) = self.by_instance(pred) {
            for p in &context {
                self.to_hnf(p, depth + 1, out)?;
            }
            return Ok(());
        }
        if pred.in_hnf() {
            if !out.contains(pred) {
                out.push(pred.clone());
            }
            Ok(())
        } else {
            Err(Unsatisfied(pred.clone()))
        }
    }

    /// Remove duplicates and predicates implied by the others through
    /// superclasses. Order of the survivors is preserved.
    pub fn simplify(&self, preds: Vec<TypePredicate>) -> Vec<TypePredicate> {
        let mut kept: Vec<TypePredicate> = Vec::new();
        for (i, pred) in preds.iter().enumerate() {
            if kept.contains(pred) {
                continue;
            }
            let implied = kept
                .iter()
                .chain(preds[i + 1..].iter())
                .filter(|other| *other != pred)
                .any(|other| self.super_closure(other).contains(pred));
            if !implied {
                kept.push(pred.clone());
            }
        }
        kept
    }

    // ── Fundep improvement ──────────────────────────────────────────────

    /// Use functional dependencies to refine `preds`: whenever the
    /// determining positions of a predicate match an instance head, or
    /// agree with another predicate of the same class, the determined
    /// positions are unified. Repeats until nothing changes.
    ///
    /// Unification failures are recorded in `ctx.errors`.
    pub fn improve(&self, ctx: &mut InferCtx, preds: &[TypePredicate], span: Span) {
        let origin = ConstraintOrigin::Fundep { span };
        loop {
            let before: Vec<TypePredicate> = preds.iter().map(|p| ctx.resolve_predicate(p)).collect();
            for (i, pred) in before.iter().enumerate() {
                let Some(class) = self.class(&pred.class) else {
                    continue;
                };
                for fd in &class.fundeps {
                    self.improve_from_instances(ctx, pred, fd, &origin);
                    for other in &before[i + 1..] {
                        if other.class != pred.class || !agree(ctx, pred, other, &fd.left) {
                            continue;
                        }
                        for &pos in &fd.right {
                            let _ = ctx.unify(
                                pred.types[pos].clone(),
                                other.types[pos].clone(),
                                origin.clone(),
                            );
                        }
                    }
                }
            }
            let after: Vec<TypePredicate> = preds.iter().map(|p| ctx.resolve_predicate(p)).collect();
            if after == before {
                break;
            }
        }
    }

    fn improve_from_instances(
        &self,
        ctx: &mut InferCtx,
        pred: &TypePredicate,
        fd: &Fundep,
        origin: &ConstraintOrigin,
    ) {
        let pick = |types: &[Ty]| -> Vec<Ty> { fd.left.iter().map(|&i| types[i].clone()).collect() };
        for inst in self.instances(&pred.class) {
            let Some(bindings) = match_types(&pick(&inst.head.types), &pick(&pred.types), inst.quantified)
            else {
                continue;
            };
            // Variables only in the determined positions get fresh types.
            let fresh: Vec<Ty> = bindings
                .into_iter()
                .map(|b| b.unwrap_or_else(|| ctx.fresh_var()))
                .collect();
            for &pos in &fd.right {
                let determined = inst.head.types[pos].instantiate(&fresh);
                let _ = ctx.unify(pred.types[pos].clone(), determined, origin.clone());
            }
            return;
        }
    }
}

fn agree(ctx: &mut InferCtx, a: &TypePredicate, b: &TypePredicate, positions: &[usize]) -> bool {
    positions.iter().all(|&i| {
        let x = ctx.resolve(a.types[i].clone());
        let y = ctx.resolve(b.types[i].clone());
        x == y
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::prelude;
    use crate::ty::TyVar;

    fn pred(class: &str, types: Vec<Ty>) -> TypePredicate {
        TypePredicate::new(class, types)
    }

    fn var(n: u32) -> Ty {
        Ty::Var(TyVar(n))
    }

    #[test]
    fn instances_resolve_ground_predicates() {
        let env = prelude();
        let classes = &env.class_env;
        assert_eq!(classes.reduce(&[pred("Eq", vec![Ty::integer()])]), Ok(vec![]));
        assert_eq!(
            classes.reduce(&[pred("Eq", vec![Ty::list(var(0))])]),
            Ok(vec![pred("Eq", vec![var(0)])])
        );
    }

    #[test]
    fn missing_instance_is_unsatisfied() {
        let env = prelude();
        let p = pred("Num", vec![Ty::string()]);
        assert_eq!(env.class_env.reduce(&[p.clone()]), Err(Unsatisfied(p)));
    }

    #[test]
    fn superclasses_are_simplified_away() {
        let env = prelude();
        let reduced = env
            .class_env
            .reduce(&[pred("Eq", vec![var(0)]), pred("Ord", vec![var(0)])])
            .unwrap();
        assert_eq!(reduced, vec![pred("Ord", vec![var(0)])]);
    }

    #[test]
    fn entailment_through_instances_and_superclasses() {
        let env = prelude();
        let given = [pred("Ord", vec![var(0)])];
        assert!(env
            .class_env
            .entails(&given, &pred("Eq", vec![Ty::list(var(0))])));
        assert!(!env.class_env.entails(&given, &pred("Num", vec![var(0)])));
    }

    fn collection_env() -> ClassEnv {
        let mut classes = ClassEnv::new();
        classes.add_class(Class {
            name: "Collection".into(),
            vars: vec![":c".into(), ":e".into()],
            superclasses: vec![],
            fundeps: vec![Fundep {
                left: vec![0],
                right: vec![1],
            }],
            methods: vec![],
            span: None,
        });
        classes.add_instance(Instance {
            quantified: 1,
            context: vec![],
            head: pred("Collection", vec![Ty::list(Ty::Gen(0)), Ty::Gen(0)]),
            span: None,
            compiler_generated: false,
        });
        classes
    }

    #[test]
    fn fundep_improvement_from_instance() {
        let classes = collection_env();
        let mut ctx = InferCtx::new();
        let elem = ctx.fresh_var();
        let p = pred("Collection", vec![Ty::list(Ty::string()), elem.clone()]);
        classes.improve(&mut ctx, &[p], Span::new(0, 0));
        assert_eq!(ctx.resolve(elem), Ty::string());
    }

    #[test]
    fn fundep_improvement_between_predicates() {
        let classes = collection_env();
        let mut ctx = InferCtx::new();
        let coll = ctx.fresh_var();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        let preds = [
            pred("Collection", vec![coll.clone(), a.clone()]),
            pred("Collection", vec![coll, b.clone()]),
        ];
        classes.improve(&mut ctx, &preds, Span::new(0, 0));
        let a = ctx.resolve(a);
        let b = ctx.resolve(b);
        assert_eq!(a, b);
    }

    #[test]
    fn overlap_and_fundep_conflicts() {
        let classes = collection_env();
        let overlapping = Instance {
            quantified: 0,
            context: vec![],
            head: pred("Collection", vec![Ty::list(Ty::integer()), Ty::integer()]),
            span: None,
            compiler_generated: false,
        };
        assert!(classes.overlapping(&overlapping).is_some());

        let conflicting = Instance {
            quantified: 0,
            context: vec![],
            head: pred("Collection", vec![Ty::list(Ty::integer()), Ty::string()]),
            span: None,
            compiler_generated: false,
        };
        assert!(classes.fundep_conflict(&conflicting).is_some());

        let unrelated = Instance {
            quantified: 0,
            context: vec![],
            head: pred("Collection", vec![Ty::string(), Ty::integer()]),
            span: None,
            compiler_generated: false,
        };
        assert!(classes.overlapping(&unrelated).is_none());
        assert!(classes.fundep_conflict(&unrelated).is_none());
    }
}
