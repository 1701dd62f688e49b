//! Conversion of parsed type expressions into types.
//!
//! Type variables written in source (`:a`) become quantified variables
//! (`Gen(i)`) numbered in order of first appearance, so the results can be
//! stored directly in schemes, class and instance definitions. Constructor
//! names are resolved against the environment and kind-checked where the
//! kind is known.

use rustc_hash::FxHashMap;

use kiln_parser::ast::{
    Ident, PredicateExpr, QualifiedTypeExpr, ToplevelDefineType, TypeExpr,
};

use crate::env::Environment;
use crate::error::TypeError;
use crate::predicate::{QualifiedType, TypePredicate};
use crate::ty::{Kind, Ty, TyCon};

/// How the type variables of a type expression are resolved.
#[derive(Clone, Debug)]
pub struct TypeVars {
    names: Vec<String>,
    /// Whether unknown variables are added on first use.
    open: bool,
    /// What the variables are bound by, for error messages.
    context: &'static str,
}

impl TypeVars {
    /// Only `names` are in scope. Any other variable is an error.
    pub fn fixed(names: Vec<String>, context: &'static str) -> Self {
        TypeVars {
            names,
            open: false,
            context,
        }
    }

    /// Variables are bound on first use.
    pub fn open() -> Self {
        TypeVars {
            names: Vec::new(),
            open: true,
            context: "this type",
        }
    }

    /// `names` are bound first, in order; later variables extend the list.
    pub fn extending(names: Vec<String>) -> Self {
        TypeVars {
            names,
            open: true,
            context: "this type",
        }
    }

    pub fn len(&self) -> u32 {
        self.names.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn resolve(&mut self, ident: &Ident) -> Result<Ty, TypeError> {
        if let Some(i) = self.index_of(&ident.name) {
            return Ok(Ty::Gen(i as u32));
        }
        if !self.open {
            return Err(TypeError::UnboundTypeVariable {
                name: ident.name.clone(),
                context: self.context,
                span: ident.span,
            });
        }
        self.names.push(ident.name.clone());
        Ok(Ty::Gen(self.names.len() as u32 - 1))
    }
}

/// Convert a type that must describe values (kind `*`).
pub fn convert_type(
    env: &Environment,
    expr: &TypeExpr,
    vars: &mut TypeVars,
) -> Result<Ty, TypeError> {
    let ty = convert_any(env, expr, vars)?;
    expect_star(&ty, expr)?;
    Ok(ty)
}

/// Convert a type of any kind, such as a class argument.
pub fn convert_any(
    env: &Environment,
    expr: &TypeExpr,
    vars: &mut TypeVars,
) -> Result<Ty, TypeError> {
    match expr {
        TypeExpr::Var(ident) => vars.resolve(ident),
        TypeExpr::Con(ident) => match env.lookup_type(&ident.name) {
            Some(info) => Ok(Ty::Con(TyCon::new(info.name.clone(), info.kind.clone()))),
            None => Err(TypeError::UnknownType {
                name: ident.name.clone(),
                span: ident.span,
            }),
        },
        TypeExpr::App { head, args, span } => {
            let head_ty = convert_any(env, head, vars)?;
            let mut kind = head_ty.kind();
            let mut ty = head_ty;
            for arg in args {
                let arg_ty = convert_any(env, arg, vars)?;
                kind = match kind {
                    Some(Kind::Arrow(from, to)) => {
                        if let Some(arg_kind) = arg_ty.kind() {
                            if arg_kind != *from {
                                return Err(TypeError::KindMismatch {
                                    ty: expr.to_string(),
                                    message: format!(
                                        "expected an argument of kind `{from}`, but `{arg}` has kind `{arg_kind}`"
                                    ),
                                    span: arg.span(),
                                });
                            }
                        }
                        Some(*to)
                    }
                    Some(Kind::Star) => {
                        return Err(TypeError::KindMismatch {
                            ty: expr.to_string(),
                            message: format!(
                                "`{head}` is applied to {} arguments, but takes {}",
                                args.len(),
                                head_ty_arity(env, head)
                            ),
                            span: *span,
                        });
                    }
                    None => None,
                };
                ty = Ty::app(ty, arg_ty);
            }
            Ok(ty)
        }
        TypeExpr::Fun { from, to, .. } => {
            let from_ty = convert_type(env, from, vars)?;
            let to_ty = convert_type(env, to, vars)?;
            Ok(Ty::fun(from_ty, to_ty))
        }
    }
}

fn head_ty_arity(env: &Environment, head: &TypeExpr) -> usize {
    match head {
        TypeExpr::Con(ident) => env
            .lookup_type(&ident.name)
            .map(|info| info.kind.arity())
            .unwrap_or(0),
        _ => 0,
    }
}

fn expect_star(ty: &Ty, expr: &TypeExpr) -> Result<(), TypeError> {
    match ty.kind() {
        Some(kind) if kind != Kind::Star => Err(TypeError::KindMismatch {
            ty: expr.to_string(),
            message: format!("expected a type of kind `*`, found kind `{kind}`"),
            span: expr.span(),
        }),
        _ => Ok(()),
    }
}

/// Convert `C t1 .. tn`, checking the class exists and takes `n` arguments.
pub fn convert_predicate(
    env: &Environment,
    expr: &PredicateExpr,
    vars: &mut TypeVars,
) -> Result<TypePredicate, TypeError> {
    let class = env
        .class_env
        .class(&expr.class.name)
        .ok_or_else(|| TypeError::UnknownClass {
            name: expr.class.name.clone(),
            span: expr.class.span,
        })?;
    if class.arity() != expr.types.len() {
        return Err(TypeError::ClassArity {
            class: class.name.clone(),
            expected: class.arity(),
            found: expr.types.len(),
            span: expr.span,
        });
    }
    let types = expr
        .types
        .iter()
        .map(|t| convert_any(env, t, vars))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypePredicate::new(class.name.clone(), types))
}

pub fn convert_qualified(
    env: &Environment,
    expr: &QualifiedTypeExpr,
    vars: &mut TypeVars,
) -> Result<QualifiedType, TypeError> {
    // The type is converted first so its variables get the low indices.
    let ty = convert_type(env, &expr.ty, vars)?;
    let predicates = expr
        .predicates
        .iter()
        .map(|p| convert_predicate(env, p, vars))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(QualifiedType::new(predicates, ty))
}

// ── Kind inference for type definitions ────────────────────────────────

/// Infer the kinds of the parameters of a group of (possibly mutually
/// recursive) type definitions from how their constructor fields use
/// them. A parameter that is never applied has kind `*`.
pub fn infer_param_kinds(
    env: &Environment,
    defs: &[ToplevelDefineType],
) -> FxHashMap<String, Vec<Kind>> {
    let mut kinds: FxHashMap<String, Vec<Kind>> = defs
        .iter()
        .map(|d| (d.name.name.clone(), vec![Kind::Star; d.vars.len()]))
        .collect();
    // Each round can only refine kinds, and refinement flows along
    // references between definitions.
    for _ in 0..=defs.len() {
        let mut changed = false;
        for def in defs {
            let mut params = kinds[&def.name.name].clone();
            let mut walker = KindWalker {
                env,
                kinds: &kinds,
                params: &def.vars,
                param_kinds: &mut params,
            };
            for ctor in &def.constructors {
                for field in &ctor.fields {
                    walker.walk(field);
                }
            }
            if params != kinds[&def.name.name] {
                kinds.insert(def.name.name.clone(), params);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    kinds
}

struct KindWalker<'a> {
    env: &'a Environment,
    kinds: &'a FxHashMap<String, Vec<Kind>>,
    params: &'a [Ident],
    param_kinds: &'a mut Vec<Kind>,
}

impl KindWalker<'_> {
    fn param(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    fn con_kind(&self, name: &str) -> Option<Kind> {
        match self.kinds.get(name) {
            Some(params) => Some(Kind::from_params(params)),
            None => self.env.lookup_type(name).map(|info| info.kind.clone()),
        }
    }

    fn kind_of(&self, expr: &TypeExpr) -> Kind {
        let kind = match expr {
            TypeExpr::Var(id) => self.param(&id.name).map(|i| self.param_kinds[i].clone()),
            TypeExpr::Con(id) => self.con_kind(&id.name),
            TypeExpr::App { head, args, .. } => {
                let mut kind = Some(self.kind_of(head));
                for _ in args {
                    kind = match kind {
                        Some(Kind::Arrow(_, to)) => Some(*to),
                        _ => None,
                    };
                }
                kind
            }
            TypeExpr::Fun { .. } => None,
        };
        kind.unwrap_or(Kind::Star)
    }

    fn refine(&mut self, index: usize, kind: Kind) {
        if self.param_kinds[index] == Kind::Star && kind != Kind::Star {
            self.param_kinds[index] = kind;
        }
    }

    fn walk(&mut self, expr: &TypeExpr) {
        match expr {
            TypeExpr::Var(_) | TypeExpr::Con(_) => {}
            TypeExpr::App { head, args, .. } => {
                match &**head {
                    TypeExpr::Var(id) => {
                        if let Some(index) = self.param(&id.name) {
                            let arg_kinds: Vec<Kind> = args.iter().map(|a| self.kind_of(a)).collect();
                            self.refine(index, Kind::from_params(&arg_kinds));
                        }
                    }
                    TypeExpr::Con(id) => {
                        let mut kind = self.con_kind(&id.name);
                        for arg in args {
                            let Some(Kind::Arrow(from, to)) = kind else {
                                break;
                            };
                            if let TypeExpr::Var(v) = arg {
                                if let Some(index) = self.param(&v.name) {
                                    self.refine(index, *from);
                                }
                            }
                            kind = Some(*to);
                        }
                    }
                    other => self.walk(other),
                }
                for arg in args {
                    self.walk(arg);
                }
            }
            TypeExpr::Fun { from, to, .. } => {
                self.walk(from);
                self.walk(to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::prelude;
    use kiln_common::span::Span;

    fn id(name: &str) -> Ident {
        Ident::new(name, Span::new(0, 0))
    }

    fn var(name: &str) -> TypeExpr {
        TypeExpr::Var(id(name))
    }

    fn con(name: &str) -> TypeExpr {
        TypeExpr::Con(id(name))
    }

    fn app(head: TypeExpr, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::App {
            head: Box::new(head),
            args,
            span: Span::new(0, 0),
        }
    }

    fn fun(from: TypeExpr, to: TypeExpr) -> TypeExpr {
        TypeExpr::Fun {
            from: Box::new(from),
            to: Box::new(to),
            span: Span::new(0, 0),
        }
    }

    #[test]
    fn variables_are_numbered_by_first_use() {
        let env = prelude();
        let mut vars = TypeVars::open();
        let ty = convert_type(&env, &fun(var(":b"), app(con("List"), vec![var(":a")])), &mut vars).unwrap();
        assert_eq!(ty, Ty::fun(Ty::Gen(0), Ty::list(Ty::Gen(1))));
        assert_eq!(vars.names(), [":b", ":a"]);
    }

    #[test]
    fn fixed_scope_rejects_unknown_variables() {
        let env = prelude();
        let mut vars = TypeVars::fixed(vec![":a".into()], "the type definition");
        let err = convert_type(&env, &var(":b"), &mut vars).unwrap_err();
        assert_eq!(err.to_string(), "type variable `:b` is not bound in the type definition");
    }

    #[test]
    fn kind_errors() {
        let env = prelude();
        let err = convert_type(&env, &con("List"), &mut TypeVars::open()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "kind mismatch in `List`: expected a type of kind `*`, found kind `* -> *`"
        );
        let err = convert_type(&env, &app(con("Integer"), vec![con("String")]), &mut TypeVars::open())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "kind mismatch in `(Integer String)`: `Integer` is applied to 1 arguments, but takes 0"
        );
        let err = convert_type(&env, &con("Set"), &mut TypeVars::open()).unwrap_err();
        assert_eq!(err.to_string(), "unknown type `Set`");
    }

    #[test]
    fn predicates_check_class_arity() {
        let env = prelude();
        let expr = PredicateExpr {
            class: id("Eq"),
            types: vec![var(":a"), var(":b")],
            span: Span::new(0, 0),
        };
        let err = convert_predicate(&env, &expr, &mut TypeVars::open()).unwrap_err();
        assert_eq!(err.to_string(), "class `Eq` expects 1 type arguments, found 2");
    }

    #[test]
    fn parameter_kinds_follow_field_usage() {
        let env = prelude();
        let wrap = ToplevelDefineType {
            name: id("Wrap"),
            vars: vec![id(":f"), id(":a")],
            docstring: None,
            constructors: vec![kiln_parser::ast::Constructor {
                name: id("Wrap"),
                fields: vec![app(var(":f"), vec![var(":a")])],
                span: Span::new(0, 0),
            }],
            repr: None,
            span: Span::new(0, 0),
            head_span: Span::new(0, 0),
        };
        let kinds = infer_param_kinds(&env, &[wrap]);
        assert_eq!(
            kinds["Wrap"],
            vec![Kind::arrow(Kind::Star, Kind::Star), Kind::Star]
        );
    }
}
