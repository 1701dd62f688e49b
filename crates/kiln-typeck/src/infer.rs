//! Expression and pattern inference.
//!
//! [`Infer`] walks one definition body, producing its type, a map from
//! every expression span to its type, and the class predicates the body
//! raised (each with the span that raised it). Solving those predicates
//! is left to the caller, which knows whether the definition has a
//! declared type.

use rustc_hash::FxHashMap;

use kiln_common::span::Span;
use kiln_parser::ast::{Body, Expr, Ident, Literal, MatchArm, Pattern};

use crate::convert::{convert_type, TypeVars};
use crate::env::{Environment, TypeEnv};
use crate::error::{ConstraintOrigin, TypeError};
use crate::predicate::{QualifiedType, TypePredicate, Types};
use crate::subst::Substitution;
use crate::ty::{Scheme, Ty, TyVar};
use crate::unify::InferCtx;

/// Class of integer literals.
pub const NUM_CLASS: &str = "Num";

/// A predicate raised while inferring a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPredicate {
    pub predicate: TypePredicate,
    pub span: Span,
}

/// Inference state for one definition or binding group.
pub struct Infer<'g> {
    pub ctx: InferCtx,
    pub env: TypeEnv<'g>,
    /// Type of every expression, keyed by its span.
    pub types: FxHashMap<Span, Ty>,
    pub preds: Vec<PendingPredicate>,
}

impl<'g> Infer<'g> {
    pub fn new(global: &'g Environment) -> Self {
        Infer {
            ctx: InferCtx::new(),
            env: TypeEnv::new(global),
            types: FxHashMap::default(),
            preds: Vec::new(),
        }
    }

    /// Record a non-unification error and return it.
    fn error<T>(&mut self, err: TypeError) -> Result<T, TypeError> {
        self.ctx.errors.push(err.clone());
        Err(err)
    }

    fn unify(&mut self, expected: Ty, found: Ty, origin: ConstraintOrigin) -> Result<(), TypeError> {
        self.ctx.unify(expected, found, origin)
    }

    fn raise(&mut self, predicates: Vec<TypePredicate>, span: Span) {
        self.preds.extend(
            predicates
                .into_iter()
                .map(|predicate| PendingPredicate { predicate, span }),
        );
    }

    fn record(&mut self, span: Span, ty: &Ty) {
        self.types.insert(span, ty.clone());
    }

    /// Instantiate a scheme, raising its predicates at `span`.
    pub fn instantiate(&mut self, scheme: &Scheme, span: Span) -> Ty {
        let qual = self.ctx.instantiate(scheme);
        self.raise(qual.predicates, span);
        qual.ty
    }

    // ── Expressions ─────────────────────────────────────────────────────

    pub fn infer_expr(&mut self, expr: &Expr) -> Result<Ty, TypeError> {
        let ty = match expr {
            Expr::Literal(lit, span) => self.infer_literal(lit, *span),
            Expr::Var(ident) => match self.env.lookup(&ident.name).cloned() {
                Some(scheme) => self.instantiate(&scheme, ident.span),
                None => {
                    return self.error(TypeError::UnboundVariable {
                        name: ident.name.clone(),
                        span: ident.span,
                    })
                }
            },
            Expr::App { func, args, span } => self.infer_call(func, args, *span)?,
            Expr::Lambda { params, body, .. } => {
                self.env.push_scope();
                let result = self.infer_function(params, body);
                self.env.pop_scope();
                result?
            }
            Expr::Let { bindings, body, .. } => {
                self.env.push_scope();
                let result = self.infer_let(bindings, body);
                self.env.pop_scope();
                result?
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => {
                let cond_ty = self.infer_expr(cond)?;
                self.unify(
                    Ty::boolean(),
                    cond_ty,
                    ConstraintOrigin::IfCondition { cond: cond.span() },
                )?;
                let then_ty = self.infer_expr(then_branch)?;
                let else_ty = self.infer_expr(else_branch)?;
                self.unify(
                    then_ty.clone(),
                    else_ty,
                    ConstraintOrigin::IfBranches {
                        if_span: *span,
                        then_span: then_branch.span(),
                        else_span: else_branch.span(),
                    },
                )?;
                then_ty
            }
            Expr::Match {
                scrutinee, arms, ..
            } => self.infer_match(scrutinee, arms)?,
            Expr::Progn(body) => self.infer_body(body)?,
            Expr::The { ty, expr: inner, .. } => {
                let mut vars = TypeVars::open();
                let annotated = match convert_type(self.env.global(), ty, &mut vars) {
                    Ok(annotated) => annotated,
                    Err(err) => return self.error(err),
                };
                let fresh = self.ctx.fresh_vars(vars.len());
                let annotated = annotated.instantiate(&fresh);
                let inner_ty = self.infer_expr(inner)?;
                self.unify(
                    annotated.clone(),
                    inner_ty,
                    ConstraintOrigin::Annotation {
                        annotation: ty.span(),
                    },
                )?;
                annotated
            }
        };
        self.record(expr.span(), &ty);
        Ok(ty)
    }

    fn infer_literal(&mut self, lit: &Literal, span: Span) -> Ty {
        match lit {
            Literal::Integer(_) => {
                let ty = self.ctx.fresh_var();
                self.raise(vec![TypePredicate::new(NUM_CLASS, vec![ty.clone()])], span);
                ty
            }
            Literal::Float(_) => Ty::double_float(),
            Literal::String(_) => Ty::string(),
        }
    }

    fn infer_call(&mut self, func: &Expr, args: &[Expr], span: Span) -> Result<Ty, TypeError> {
        let mut func_ty = self.infer_expr(func)?;
        if args.is_empty() {
            // `(f)` applies `f` to Unit.
            let ret = self.ctx.fresh_var();
            self.unify(
                func_ty,
                Ty::fun(Ty::unit(), ret.clone()),
                ConstraintOrigin::Application {
                    call: span,
                    arg: span,
                    index: 0,
                },
            )?;
            return Ok(ret);
        }
        for (index, arg) in args.iter().enumerate() {
            let arg_ty = self.infer_expr(arg)?;
            let origin = ConstraintOrigin::Application {
                call: span,
                arg: arg.span(),
                index,
            };
            func_ty = match self.ctx.resolve(func_ty) {
                Ty::Fun(param, ret) => {
                    self.unify(*param, arg_ty, origin)?;
                    *ret
                }
                other => {
                    let ret = self.ctx.fresh_var();
                    self.unify(other, Ty::fun(arg_ty, ret.clone()), origin)?;
                    ret
                }
            };
        }
        Ok(func_ty)
    }

    /// Infer `params -> body` in the current scope.
    pub fn infer_function(&mut self, params: &[Pattern], body: &Body) -> Result<Ty, TypeError> {
        let param_tys = params
            .iter()
            .map(|p| self.infer_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        let body_ty = self.infer_body(body)?;
        Ok(Ty::fun_n(param_tys, body_ty))
    }

    fn infer_let(&mut self, bindings: &[(Ident, Expr)], body: &Body) -> Result<Ty, TypeError> {
        for (name, value) in bindings {
            self.ctx.enter_level();
            let value_ty = self.infer_expr(value);
            self.ctx.leave_level();
            let scheme = self.generalize_local(value_ty?);
            self.env.insert(name.name.clone(), scheme);
        }
        self.infer_body(body)
    }

    /// Generalize a `let`-bound type over the variables introduced while
    /// inferring it, except those still mentioned by a pending predicate.
    fn generalize_local(&mut self, ty: Ty) -> Scheme {
        let ty = self.ctx.resolve(ty);
        let mut constrained = Vec::new();
        for pending in &self.preds {
            let pred = self.ctx.resolve_predicate(&pending.predicate);
            pred.collect_free(&mut constrained);
        }
        let vars: Vec<TyVar> = self
            .ctx
            .generalizable_vars(&ty)
            .into_iter()
            .filter(|v| !constrained.contains(v))
            .collect();
        quantify(&vars, &QualifiedType::unqualified(ty))
    }

    fn infer_match(&mut self, scrutinee: &Expr, arms: &[MatchArm]) -> Result<Ty, TypeError> {
        let scrutinee_ty = self.infer_expr(scrutinee)?;
        let mut result: Option<(Ty, Span)> = None;
        for arm in arms {
            self.env.push_scope();
            let arm_ty = self.infer_arm(arm, &scrutinee_ty, scrutinee.span());
            self.env.pop_scope();
            let arm_ty = arm_ty?;
            match &result {
                None => result = Some((arm_ty, arm.span)),
                Some((first, first_span)) => {
                    self.unify(
                        first.clone(),
                        arm_ty,
                        ConstraintOrigin::MatchArms {
                            first: *first_span,
                            arm: arm.span,
                        },
                    )?;
                }
            }
        }
        // The parser guarantees at least one arm.
        Ok(result.map(|(ty, _)| ty).unwrap_or_else(|| self.ctx.fresh_var()))
    }

    fn infer_arm(&mut self, arm: &MatchArm, scrutinee_ty: &Ty, scrutinee: Span) -> Result<Ty, TypeError> {
        let pattern_ty = self.infer_pattern(&arm.pattern)?;
        self.unify(
            scrutinee_ty.clone(),
            pattern_ty,
            ConstraintOrigin::MatchPattern {
                scrutinee,
                pattern: arm.pattern.span(),
            },
        )?;
        self.infer_body(&arm.body)
    }

    pub fn infer_body(&mut self, body: &Body) -> Result<Ty, TypeError> {
        let mut ty = Ty::unit();
        for expr in &body.exprs {
            ty = self.infer_expr(expr)?;
        }
        Ok(ty)
    }

    // ── Patterns ────────────────────────────────────────────────────────

    /// Infer a pattern's type, binding its variables monomorphically in
    /// the current scope.
    pub fn infer_pattern(&mut self, pattern: &Pattern) -> Result<Ty, TypeError> {
        let ty = match pattern {
            Pattern::Var(ident) => {
                let ty = self.ctx.fresh_var();
                self.env.insert(ident.name.clone(), Scheme::mono(ty.clone()));
                ty
            }
            Pattern::Wildcard(_) => self.ctx.fresh_var(),
            Pattern::Literal(lit, span) => self.infer_literal(lit, *span),
            Pattern::Constructor {
                name,
                patterns,
                span,
            } => {
                let Some(info) = self.env.global().lookup_constructor(&name.name) else {
                    return self.error(TypeError::UnknownConstructor {
                        name: name.name.clone(),
                        span: name.span,
                    });
                };
                if info.arity != patterns.len() {
                    return self.error(TypeError::ConstructorArity {
                        name: name.name.clone(),
                        expected: info.arity,
                        found: patterns.len(),
                        span: *span,
                    });
                }
                let ctor_ty = self.instantiate(&info.scheme, *span);
                let (fields, result) = ctor_ty.fun_parts();
                let fields: Vec<Ty> = fields.into_iter().cloned().collect();
                let result = result.clone();
                for (field, sub) in fields.into_iter().zip(patterns) {
                    let sub_ty = self.infer_pattern(sub)?;
                    self.unify(field, sub_ty, ConstraintOrigin::Pattern { span: sub.span() })?;
                }
                result
            }
        };
        self.record(pattern.span(), &ty);
        Ok(ty)
    }
}

/// Close `qual` over `vars`: the `i`th variable becomes `Gen(i)`.
pub fn quantify(vars: &[TyVar], qual: &QualifiedType) -> Scheme {
    let subst: Substitution = vars
        .iter()
        .enumerate()
        .map(|(i, v)| (*v, Ty::Gen(i as u32)))
        .collect();
    Scheme::new(vars.len() as u32, qual.substitute(&subst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::prelude;

    fn sp(start: u32) -> Span {
        Span::new(start, start + 1)
    }

    fn var(name: &str, at: u32) -> Expr {
        Expr::Var(Ident::new(name, sp(at)))
    }

    fn int(n: i64, at: u32) -> Expr {
        Expr::Literal(Literal::Integer(n), sp(at))
    }

    fn call(func: Expr, args: Vec<Expr>, at: u32) -> Expr {
        Expr::App {
            func: Box::new(func),
            args,
            span: sp(at),
        }
    }

    fn body(exprs: Vec<Expr>) -> Body {
        Body {
            exprs,
            span: sp(99),
        }
    }

    fn resolved(infer: &mut Infer<'_>, ty: Ty) -> String {
        let ty = infer.ctx.resolve(ty);
        ty.to_string()
    }

    #[test]
    fn integer_literals_raise_num() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let ty = infer.infer_expr(&int(1, 0)).unwrap();
        assert!(matches!(ty, Ty::Var(_)));
        assert_eq!(infer.preds.len(), 1);
        assert_eq!(infer.preds[0].predicate.class, "Num");
    }

    #[test]
    fn application_instantiates_methods() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let expr = call(var("==", 1), vec![var("True", 2), var("False", 3)], 0);
        let ty = infer.infer_expr(&expr).unwrap();
        assert_eq!(resolved(&mut infer, ty), "Boolean");
        let pred = infer.ctx.resolve_predicate(&infer.preds[0].predicate.clone());
        assert_eq!(pred.to_string(), "Eq Boolean");
        assert_eq!(infer.preds[0].span, sp(1));
    }

    #[test]
    fn let_bindings_are_polymorphic() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let id = Expr::Lambda {
            params: vec![Pattern::Var(Ident::new("x", sp(11)))],
            body: body(vec![var("x", 12)]),
            span: sp(10),
        };
        let expr = Expr::Let {
            bindings: vec![(Ident::new("id", sp(1)), id)],
            body: body(vec![
                call(var("id", 20), vec![var("True", 21)], 22),
                call(var("id", 30), vec![Expr::Literal(Literal::String("s".into()), sp(31))], 32),
            ]),
            span: sp(0),
        };
        let ty = infer.infer_expr(&expr).unwrap();
        assert_eq!(resolved(&mut infer, ty), "String");
        assert!(infer.ctx.errors.is_empty());
    }

    #[test]
    fn if_condition_must_be_boolean() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let expr = Expr::If {
            cond: Box::new(Expr::Literal(Literal::String("no".into()), sp(1))),
            then_branch: Box::new(var("True", 2)),
            else_branch: Box::new(var("False", 3)),
            span: sp(0),
        };
        let err = infer.infer_expr(&expr).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch: expected `Boolean`, found `String`"
        );
        assert_eq!(err.span(), Some(sp(1)));
    }

    #[test]
    fn constructor_patterns_check_arity() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let pattern = Pattern::Constructor {
            name: Ident::new("Cons", sp(1)),
            patterns: vec![Pattern::Wildcard(sp(2))],
            span: sp(0),
        };
        let err = infer.infer_pattern(&pattern).unwrap_err();
        assert_eq!(
            err.to_string(),
            "constructor `Cons` has 2 fields, but the pattern has 1"
        );
    }

    #[test]
    fn match_arms_bind_pattern_variables() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        let arm = MatchArm {
            pattern: Pattern::Constructor {
                name: Ident::new("Cons", sp(3)),
                patterns: vec![
                    Pattern::Var(Ident::new("head", sp(4))),
                    Pattern::Wildcard(sp(5)),
                ],
                span: sp(2),
            },
            body: body(vec![var("head", 6)]),
            span: sp(2),
        };
        let expr = Expr::Match {
            scrutinee: Box::new(call(
                var("Cons", 8),
                vec![Expr::Literal(Literal::String("x".into()), sp(9)), var("Nil", 10)],
                7,
            )),
            arms: vec![arm],
            span: sp(0),
        };
        let ty = infer.infer_expr(&expr).unwrap();
        assert_eq!(resolved(&mut infer, ty), "String");
    }

    #[test]
    fn nullary_calls_pass_unit() {
        let env = prelude();
        let mut infer = Infer::new(&env);
        infer.env.insert(
            "thunk".into(),
            Scheme::mono(Ty::fun(Ty::unit(), Ty::integer())),
        );
        let ty = infer.infer_expr(&call(var("thunk", 1), vec![], 0)).unwrap();
        assert_eq!(resolved(&mut infer, ty), "Integer");
    }
}
