//! The toplevel orchestrator.
//!
//! Checks a whole [`Program`] in a fixed order of phases, threading the
//! [`Environment`] explicitly from one to the next:
//!
//! 1. type definitions
//! 2. class definitions, superclasses first
//! 3. instance heads (predeclared, so method types are known)
//! 4. declared signatures
//! 5. value definitions: undeclared ones in binding groups, then declared
//!    ones against their signatures
//! 6. instance bodies: user instances, then compiler-generated ones
//! 7. specializations
//!
//! A phase that reports an error stops the remaining phases.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use kiln_common::span::Span;
use kiln_parser::ast::{
    Body, Expr, Ident, Pattern, Program, ReprKind, ToplevelDeclare, ToplevelDefine,
    ToplevelDefineClass, ToplevelDefineInstance, ToplevelDefineType, ToplevelSpecialize,
};

use crate::classes::{Class, ClassEnv, Fundep, Instance};
use crate::convert::{
    convert_predicate, convert_qualified, convert_type, infer_param_kinds, TypeVars,
};
use crate::env::{ConstructorInfo, Environment, Specialization, TypeInfo};
use crate::error::{ConstraintOrigin, TypeError};
use crate::graph::DepGraph;
use crate::infer::{quantify, Infer, PendingPredicate};
use crate::predicate::{QualifiedType, TypePredicate, Types};
use crate::subst::{match_type, Substitution};
use crate::ty::{Kind, Scheme, Ty, TyCon, TyVar};
use crate::{TypeckResult, TypedDefine, TypedInstance, TypedMethod};

/// Errors and warnings collected across phases.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeError>,
}

impl Diagnostics {
    pub fn push(&mut self, err: TypeError) {
        if err.is_warning() {
            self.warnings.push(err);
        } else {
            self.errors.push(err);
        }
    }

    pub fn extend(&mut self, errs: impl IntoIterator<Item = TypeError>) {
        for err in errs {
            self.push(err);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Check `program` against `env`.
pub fn check_program(env: Environment, program: &Program) -> TypeckResult {
    let mut diags = Diagnostics::default();
    let mut definitions = Vec::new();
    let mut instances = Vec::new();

    let env = 'phases: {
        let env = define_types(env, &program.types, &mut diags);
        if diags.has_errors() {
            break 'phases env;
        }
        let env = define_classes(env, &program.classes, &mut diags);
        if diags.has_errors() {
            break 'phases env;
        }
        let (env, prepared) = predeclare_instances(env, &program.instances, &mut diags);
        if diags.has_errors() {
            break 'phases env;
        }
        let (env, declared) = declare_values(env, &program.declares, &program.defines, &mut diags);
        if diags.has_errors() {
            break 'phases env;
        }
        let (env, typed) = define_values(env, &program.defines, &declared, &mut diags);
        definitions = typed;
        if diags.has_errors() {
            break 'phases env;
        }
        instances = check_instances(&env, &program.instances, &prepared, &mut diags);
        if diags.has_errors() {
            break 'phases env;
        }
        specialize(env, &program.specializations, &mut diags)
    };

    debug!(
        file = %program.file,
        definitions = definitions.len(),
        instances = instances.len(),
        errors = diags.errors.len(),
        warnings = diags.warnings.len(),
        "checked program"
    );
    TypeckResult {
        env,
        definitions,
        instances,
        errors: diags.errors,
        warnings: diags.warnings,
    }
}

// ── Phase 1: type definitions ──────────────────────────────────────────

pub fn define_types(
    mut env: Environment,
    defs: &[ToplevelDefineType],
    diags: &mut Diagnostics,
) -> Environment {
    let mut accepted: Vec<ToplevelDefineType> = Vec::new();
    let mut ctor_spans: FxHashMap<&str, Span> = FxHashMap::default();
    for def in defs {
        if let Some(err) = duplicate_type(&env, &accepted, def) {
            diags.push(err);
            continue;
        }
        if let Some(err) = duplicate_ident(&def.vars, "type variable") {
            diags.push(err);
            continue;
        }
        for ctor in &def.constructors {
            let previous = ctor_spans.get(ctor.name.name.as_str()).copied();
            let builtin = env.lookup_constructor(&ctor.name.name).is_some();
            if previous.is_some() || builtin {
                diags.push(TypeError::Duplicate {
                    what: "constructor",
                    name: ctor.name.name.clone(),
                    span: ctor.name.span,
                    previous,
                });
            } else {
                ctor_spans.insert(&ctor.name.name, ctor.name.span);
            }
        }
        accepted.push(def.clone());
    }

    // Register every type with its inferred kind before converting any
    // field, so definitions can refer to each other.
    let kinds = infer_param_kinds(&env, &accepted);
    for def in &accepted {
        let params = kinds
            .get(&def.name.name)
            .cloned()
            .unwrap_or_else(|| vec![Kind::Star; def.vars.len()]);
        env.insert_type(TypeInfo {
            name: def.name.name.clone(),
            kind: Kind::from_params(&params),
            params: def.vars.iter().map(|v| v.name.clone()).collect(),
            constructors: def.constructors.iter().map(|c| c.name.name.clone()).collect(),
            repr: def.repr.as_ref().map(|r| r.kind.clone()),
            span: Some(def.span),
        });
    }

    for def in &accepted {
        if let Err(err) = validate_repr(def) {
            diags.push(err);
        }
        let Some(con) = env
            .lookup_type(&def.name.name)
            .map(|info| TyCon::new(info.name.clone(), info.kind.clone()))
        else {
            continue;
        };
        let kind = con.kind.clone();
        let result = Ty::apply(Ty::Con(con), (0..def.vars.len() as u32).map(Ty::Gen));
        let names: Vec<String> = def.vars.iter().map(|v| v.name.clone()).collect();
        for ctor in &def.constructors {
            let mut vars = TypeVars::fixed(names.clone(), "the type definition");
            let fields = ctor
                .fields
                .iter()
                .map(|f| convert_type(&env, f, &mut vars))
                .collect::<Result<Vec<_>, _>>();
            match fields {
                Ok(fields) => {
                    let arity = fields.len();
                    let ty = Ty::fun_n(fields, result.clone());
                    env.insert_constructor(ConstructorInfo {
                        name: ctor.name.name.clone(),
                        type_name: def.name.name.clone(),
                        scheme: Scheme::new(
                            def.vars.len() as u32,
                            QualifiedType::unqualified(ty),
                        ),
                        arity,
                        span: Some(ctor.span),
                    });
                }
                Err(err) => diags.push(err),
            }
        }
        trace!(name = %def.name, %kind, "defined type");
    }
    debug!(types = accepted.len(), "type definitions registered");
    env
}

fn duplicate_type(
    env: &Environment,
    accepted: &[ToplevelDefineType],
    def: &ToplevelDefineType,
) -> Option<TypeError> {
    let previous = accepted.iter().find(|d| d.name.name == def.name.name);
    if previous.is_none() && env.lookup_type(&def.name.name).is_none() {
        return None;
    }
    Some(TypeError::Duplicate {
        what: "type",
        name: def.name.name.clone(),
        span: def.name.span,
        previous: previous.map(|d| d.name.span),
    })
}

fn duplicate_ident(idents: &[Ident], what: &'static str) -> Option<TypeError> {
    idents.iter().enumerate().find_map(|(i, ident)| {
        let previous = idents[..i].iter().find(|p| p.name == ident.name)?;
        Some(TypeError::Duplicate {
            what,
            name: ident.name.clone(),
            span: ident.span,
            previous: Some(previous.span),
        })
    })
}

fn validate_repr(def: &ToplevelDefineType) -> Result<(), TypeError> {
    let Some(repr) = &def.repr else {
        return Ok(());
    };
    let reason = match &repr.kind {
        ReprKind::Enum if def.constructors.is_empty() => Some("an enum needs at least one constructor"),
        ReprKind::Enum if def.constructors.iter().any(|c| !c.fields.is_empty()) => {
            Some("every constructor of an enum must be nullary")
        }
        ReprKind::Transparent
            if def.constructors.len() != 1 || def.constructors[0].fields.len() != 1 =>
        {
            Some("a transparent type needs exactly one constructor with exactly one field")
        }
        ReprKind::Native(_) if !def.constructors.is_empty() => {
            Some("a native type cannot have constructors")
        }
        _ => None,
    };
    match reason {
        Some(reason) => Err(TypeError::InvalidRepr {
            type_name: def.name.name.clone(),
            repr: repr.kind.keyword(),
            reason,
            span: repr.span,
        }),
        None => Ok(()),
    }
}

// ── Phase 2: classes ───────────────────────────────────────────────────

pub fn define_classes(
    mut env: Environment,
    defs: &[ToplevelDefineClass],
    diags: &mut Diagnostics,
) -> Environment {
    // Duplicates and unknown superclasses first.
    let mut accepted: Vec<&ToplevelDefineClass> = Vec::new();
    for def in defs {
        let previous = accepted.iter().find(|d| d.name.name == def.name.name);
        if previous.is_some() || env.class_env.class(&def.name.name).is_some() {
            diags.push(TypeError::Duplicate {
                what: "class",
                name: def.name.name.clone(),
                span: def.name.span,
                previous: previous.map(|d| d.name.span),
            });
            continue;
        }
        accepted.push(def);
    }
    for def in &accepted {
        for sup in &def.superclasses {
            let known = env.class_env.class(&sup.class.name).is_some()
                || accepted.iter().any(|d| d.name.name == sup.class.name);
            if !known {
                diags.push(TypeError::UnknownClass {
                    name: sup.class.name.clone(),
                    span: sup.class.span,
                });
            }
        }
    }
    if diags.has_errors() {
        return env;
    }

    let mut graph = DepGraph::new(accepted.len());
    for (i, def) in accepted.iter().enumerate() {
        for sup in &def.superclasses {
            if let Some(j) = accepted.iter().position(|d| d.name.name == sup.class.name) {
                graph.add_dependency(i, j);
            }
        }
    }
    let order = match graph.topological_sort() {
        Ok(order) => order,
        Err(cycle) => {
            let first = accepted[cycle.cycle_path[0]];
            diags.push(TypeError::SuperclassCycle {
                classes: cycle
                    .cycle_path
                    .iter()
                    .map(|&i| accepted[i].name.name.clone())
                    .collect(),
                span: first.head_span,
            });
            return env;
        }
    };

    // Heads, superclasses first, so superclass predicates resolve.
    for &i in &order {
        let def = accepted[i];
        match class_head(&env, def) {
            Ok(class) => env.class_env.add_class(class),
            Err(err) => diags.push(err),
        }
    }

    // Methods, once every class is known.
    for &i in &order {
        let def = accepted[i];
        if env.class_env.class(&def.name.name).is_none() {
            continue;
        }
        define_methods(&mut env, def, diags);
    }
    debug!(classes = accepted.len(), "class definitions registered");
    env
}

fn class_head(env: &Environment, def: &ToplevelDefineClass) -> Result<Class, TypeError> {
    let all_vars = def.all_vars();
    if let Some(err) = duplicate_ident(&def.vars, "type variable") {
        return Err(err);
    }
    let names: Vec<String> = all_vars.iter().map(|v| v.name.clone()).collect();
    let mut vars = TypeVars::fixed(names.clone(), "the class head");
    let superclasses = def
        .superclasses
        .iter()
        .map(|p| convert_predicate(env, p, &mut vars))
        .collect::<Result<Vec<_>, _>>()?;
    let position = |ident: &Ident| names.iter().position(|n| *n == ident.name).unwrap_or(0);
    let fundeps = def
        .fundeps
        .iter()
        .map(|fd| Fundep {
            left: fd.left.iter().map(position).collect(),
            right: fd.right.iter().map(position).collect(),
        })
        .collect();
    Ok(Class {
        name: def.name.name.clone(),
        vars: names,
        superclasses,
        fundeps,
        methods: Vec::new(),
        span: Some(def.head_span),
    })
}

fn define_methods(env: &mut Environment, def: &ToplevelDefineClass, diags: &mut Diagnostics) {
    let Some(mut class) = env.class_env.class(&def.name.name).cloned() else {
        return;
    };
    let arity = class.arity() as u32;
    let self_pred = TypePredicate::new(class.name.clone(), (0..arity).map(Ty::Gen).collect());
    let mut seen: Vec<&Ident> = Vec::new();
    for method in &def.methods {
        let previous = seen.iter().find(|m| m.name == method.name.name);
        if previous.is_some() || env.lookup_value(&method.name.name).is_some() {
            diags.push(TypeError::Duplicate {
                what: "method",
                name: method.name.name.clone(),
                span: method.name.span,
                previous: previous.map(|m| m.span),
            });
            continue;
        }
        seen.push(&method.name);

        let mut vars = TypeVars::extending(class.vars.clone());
        let qual = match convert_qualified(env, &method.ty, &mut vars) {
            Ok(qual) => qual,
            Err(err) => {
                diags.push(err);
                continue;
            }
        };
        if !mentions_gen_below(&qual.ty, arity) {
            diags.push(TypeError::MethodMissingClassVariable {
                class: class.name.clone(),
                method: method.name.name.clone(),
                span: method.span,
            });
            continue;
        }
        let mut predicates = vec![self_pred.clone()];
        predicates.extend(qual.predicates);
        let scheme = Scheme::new(vars.len(), QualifiedType::new(predicates, qual.ty));
        trace!(method = %method.name, scheme = %scheme, "declared method");
        env.insert_value(method.name.name.clone(), scheme);
        env.insert_method(method.name.name.clone(), class.name.clone());
        class.methods.push(method.name.name.clone());
    }
    env.class_env.add_class(class);
}

fn mentions_gen_below(ty: &Ty, bound: u32) -> bool {
    match ty {
        Ty::Gen(i) => *i < bound,
        Ty::Var(_) | Ty::Con(_) => false,
        Ty::App(a, b) | Ty::Fun(a, b) => mentions_gen_below(a, bound) || mentions_gen_below(b, bound),
    }
}

// ── Phase 3: instance heads ────────────────────────────────────────────

/// An instance head that passed predeclaration.
#[derive(Clone, Debug)]
pub struct PreparedInstance {
    /// Index into the program's instance list.
    pub index: usize,
    pub instance: Instance,
}

pub fn predeclare_instances(
    mut env: Environment,
    defs: &[ToplevelDefineInstance],
    diags: &mut Diagnostics,
) -> (Environment, Vec<PreparedInstance>) {
    let mut prepared = Vec::new();
    for (index, def) in defs.iter().enumerate() {
        match instance_head(&env, def) {
            Ok(instance) => {
                if let Some(existing) = env.class_env.overlapping(&instance) {
                    diags.push(TypeError::OverlappingInstances {
                        instance: instance.head.clone(),
                        existing: existing.head.clone(),
                        span: def.head_span,
                        previous: existing.span,
                    });
                    continue;
                }
                if let Some(existing) = env.class_env.fundep_conflict(&instance) {
                    diags.push(TypeError::FundepConflict {
                        instance: instance.head.clone(),
                        existing: existing.head.clone(),
                        span: def.head_span,
                        previous: existing.span,
                    });
                    continue;
                }
                check_instance_methods(&env.class_env, def, &instance.head, diags);
                trace!(instance = %instance.head, "predeclared instance");
                env.class_env.add_instance(instance.clone());
                prepared.push(PreparedInstance { index, instance });
            }
            Err(err) => diags.push(err),
        }
    }
    debug!(instances = prepared.len(), "instances predeclared");
    (env, prepared)
}

fn instance_head(env: &Environment, def: &ToplevelDefineInstance) -> Result<Instance, TypeError> {
    let mut vars = TypeVars::open();
    let head = convert_predicate(env, &def.predicate, &mut vars)?;
    let mut vars = TypeVars::fixed(vars.names().to_vec(), "the instance head");
    let context = def
        .context
        .iter()
        .map(|p| convert_predicate(env, p, &mut vars))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instance {
        quantified: vars.len(),
        context,
        head,
        span: Some(def.head_span),
        compiler_generated: def.compiler_generated,
    })
}

fn check_instance_methods(
    classes: &ClassEnv,
    def: &ToplevelDefineInstance,
    head: &TypePredicate,
    diags: &mut Diagnostics,
) {
    let Some(class) = classes.class(&head.class) else {
        return;
    };
    let mut seen: Vec<&Ident> = Vec::new();
    for method in &def.methods {
        if let Some(previous) = seen.iter().find(|m| m.name == method.name.name) {
            diags.push(TypeError::Duplicate {
                what: "method",
                name: method.name.name.clone(),
                span: method.name.span,
                previous: Some(previous.span),
            });
            continue;
        }
        seen.push(&method.name);
        if !class.methods.contains(&method.name.name) {
            diags.push(TypeError::UnknownMethod {
                method: method.name.name.clone(),
                class: class.name.clone(),
                span: method.name.span,
            });
        }
    }
    for method in &class.methods {
        if !seen.iter().any(|m| m.name == *method) {
            diags.push(TypeError::MissingMethod {
                method: method.clone(),
                instance: head.clone(),
                span: def.head_span,
            });
        }
    }
}

// ── Phase 4: declarations ──────────────────────────────────────────────

pub fn declare_values(
    mut env: Environment,
    declares: &[ToplevelDeclare],
    defines: &[ToplevelDefine],
    diags: &mut Diagnostics,
) -> (Environment, FxHashMap<String, Scheme>) {
    let mut declared: FxHashMap<String, Scheme> = FxHashMap::default();
    let mut spans: FxHashMap<&str, Span> = FxHashMap::default();
    for decl in declares {
        let name = &decl.name.name;
        if let Some(previous) = spans.get(name.as_str()) {
            diags.push(TypeError::Duplicate {
                what: "declaration",
                name: name.clone(),
                span: decl.name.span,
                previous: Some(*previous),
            });
            continue;
        }
        spans.insert(name, decl.name.span);
        let what = if env.method_class(name).is_some() {
            Some("class method")
        } else if env.lookup_constructor(name).is_some() {
            Some("constructor")
        } else {
            None
        };
        if let Some(what) = what {
            diags.push(TypeError::InvalidDeclaration {
                name: name.clone(),
                what,
                span: decl.name.span,
            });
            continue;
        }
        if !defines.iter().any(|d| d.name.name == *name) {
            diags.push(TypeError::OrphanDeclaration {
                name: name.clone(),
                span: decl.span,
            });
            continue;
        }
        let mut vars = TypeVars::open();
        match convert_qualified(&env, &decl.ty, &mut vars) {
            Ok(qual) => {
                let scheme = Scheme::new(vars.len(), qual);
                trace!(name = %decl.name, scheme = %scheme, "declared");
                env.insert_value(name.clone(), scheme.clone());
                declared.insert(name.clone(), scheme);
                if decl.monomorphize.is_some() {
                    env.mark_monomorphize(name.clone());
                }
            }
            Err(err) => diags.push(err),
        }
    }
    debug!(declarations = declared.len(), "signatures declared");
    (env, declared)
}

// ── Phase 5: value definitions ─────────────────────────────────────────

pub fn define_values(
    mut env: Environment,
    defines: &[ToplevelDefine],
    declared: &FxHashMap<String, Scheme>,
    diags: &mut Diagnostics,
) -> (Environment, Vec<TypedDefine>) {
    let mut accepted: Vec<&ToplevelDefine> = Vec::new();
    for def in defines {
        let name = &def.name.name;
        let previous = accepted.iter().find(|d| d.name.name == *name);
        let shadows_builtin = env.method_class(name).is_some() || env.lookup_constructor(name).is_some();
        if previous.is_some() || shadows_builtin {
            diags.push(TypeError::Duplicate {
                what: "definition",
                name: name.clone(),
                span: def.name.span,
                previous: previous.map(|d| d.name.span),
            });
            continue;
        }
        if def.monomorphize.is_some() {
            env.mark_monomorphize(name.clone());
        }
        accepted.push(def);
    }

    let mut typed = Vec::new();

    // Undeclared definitions, in binding groups, dependencies first.
    let undeclared: Vec<&ToplevelDefine> = accepted
        .iter()
        .copied()
        .filter(|d| !declared.contains_key(&d.name.name))
        .collect();
    let mut graph = DepGraph::new(undeclared.len());
    for (i, def) in undeclared.iter().enumerate() {
        for name in references(def) {
            if let Some(j) = undeclared.iter().position(|d| d.name.name == name) {
                graph.add_dependency(i, j);
            }
        }
    }
    let mut failed: FxHashSet<usize> = FxHashSet::default();
    for group in graph.strongly_connected_components() {
        // A group that uses a failed group would only repeat its errors.
        let blocked = group
            .iter()
            .any(|&i| graph.dependencies(i).iter().any(|d| failed.contains(d)));
        if blocked {
            failed.extend(group);
            continue;
        }
        let members: Vec<&ToplevelDefine> = group.iter().map(|&i| undeclared[i]).collect();
        match infer_group(&env, &members, diags) {
            Some(results) => {
                for (def, scheme, types, ok) in results {
                    debug!(name = %def.name, scheme = %scheme, "inferred");
                    env.insert_value(def.name.name.clone(), scheme.clone());
                    if ok {
                        typed.push(TypedDefine {
                            name: def.name.name.clone(),
                            scheme,
                            types,
                            span: def.span,
                            monomorphize: def.monomorphize.is_some(),
                        });
                    }
                }
            }
            None => failed.extend(group),
        }
    }

    // Declared definitions, against their signatures.
    for def in accepted {
        let Some(scheme) = declared.get(&def.name.name) else {
            continue;
        };
        if let Some(define) = check_declared(&env, def, scheme, diags) {
            typed.push(define);
        }
    }

    typed.sort_by_key(|d| d.span.start);
    (env, typed)
}

type GroupResult<'d> = (&'d ToplevelDefine, Scheme, FxHashMap<Span, Ty>, bool);

/// Infer a binding group together. Each member gets its scheme, its span
/// to type map and whether defaulting succeeded.
fn infer_group<'d>(
    env: &Environment,
    members: &[&'d ToplevelDefine],
    diags: &mut Diagnostics,
) -> Option<Vec<GroupResult<'d>>> {
    let mut infer = Infer::new(env);
    infer.ctx.enter_level();
    let vars: Vec<Ty> = infer.ctx.fresh_vars(members.len() as u32);
    for (def, var) in members.iter().zip(&vars) {
        infer.env.insert(def.name.name.clone(), Scheme::mono(var.clone()));
    }
    let mut member_types = Vec::with_capacity(members.len());
    for (def, var) in members.iter().zip(&vars) {
        if let Ok(ty) = infer_define(&mut infer, def) {
            let _ = infer.ctx.unify(
                var.clone(),
                ty,
                ConstraintOrigin::Definition { span: def.name.span },
            );
        }
        member_types.push(std::mem::take(&mut infer.types));
    }
    infer.ctx.leave_level();
    if !infer.ctx.errors.is_empty() {
        diags.extend(std::mem::take(&mut infer.ctx.errors));
        return None;
    }

    let mut keep = Vec::new();
    for var in &vars {
        let ty = infer.ctx.resolve(var.clone());
        ty.collect_free(&mut keep);
    }
    let owners: Vec<(String, Span)> = members.iter().map(|d| (d.name.name.clone(), d.span)).collect();
    // Values without parameters are not generalized over defaultable
    // predicates.
    let default_all = members.len() == 1 && !members[0].is_function();
    let solution = solve(&mut infer, &env.class_env, &keep, &[], &owners, default_all, diags)?;

    let mut results = Vec::with_capacity(members.len());
    for ((def, var), types) in members.iter().zip(&vars).zip(member_types) {
        let ty = infer.ctx.resolve(var.clone());
        let free = ty.free_type_variables();
        let predicates: Vec<TypePredicate> = solution
            .retained
            .iter()
            .map(|p| infer.ctx.resolve_predicate(&p.predicate))
            .filter(|p| p.free_type_variables().iter().all(|v| free.contains(v)))
            .collect();
        let scheme = quantify(&free, &QualifiedType::new(predicates, ty));
        let types = finish_types(&mut infer, types, &free);
        results.push((*def, scheme, types, !solution.defaulting_failed));
    }
    Some(results)
}

fn check_declared(
    env: &Environment,
    def: &ToplevelDefine,
    scheme: &Scheme,
    diags: &mut Diagnostics,
) -> Option<TypedDefine> {
    let mut infer = Infer::new(env);
    infer.ctx.enter_level();
    let skolems = infer.ctx.fresh_vars(scheme.quantified);
    let expected = scheme.instantiate(&skolems);
    if let Ok(ty) = infer_define(&mut infer, def) {
        let _ = infer.ctx.unify(
            expected.ty.clone(),
            ty,
            ConstraintOrigin::Signature {
                name: def.name.name.clone(),
                span: def.name.span,
            },
        );
    }
    infer.ctx.leave_level();
    if !infer.ctx.errors.is_empty() {
        diags.extend(std::mem::take(&mut infer.ctx.errors));
        return None;
    }
    let Some(skolem_vars) = rigid_vars(&mut infer, &skolems) else {
        diags.push(TypeError::SignatureTooGeneral {
            name: def.name.name.clone(),
            declared: scheme.to_string(),
            span: def.name.span,
        });
        return None;
    };

    let owners = [(def.name.name.clone(), def.span)];
    let solution = solve(
        &mut infer,
        &env.class_env,
        &skolem_vars,
        &expected.predicates,
        &owners,
        false,
        diags,
    )?;
    if report_missing(&mut infer, &solution, &skolem_vars, &def.name.name, diags) {
        return None;
    }
    let types = std::mem::take(&mut infer.types);
    let types = finish_types(&mut infer, types, &skolem_vars);
    trace!(name = %def.name, "checked against signature");
    (!solution.defaulting_failed).then(|| TypedDefine {
        name: def.name.name.clone(),
        scheme: scheme.clone(),
        types,
        span: def.span,
        monomorphize: def.monomorphize.is_some(),
    })
}

/// The type of a definition: `params -> body`, or just the body for a
/// value. A nullary function takes `Unit`.
fn infer_define(infer: &mut Infer<'_>, def: &ToplevelDefine) -> Result<Ty, TypeError> {
    infer.env.push_scope();
    let result = infer_lambda(infer, &def.params, &def.body, def.orig_params.is_empty(), def.span);
    infer.env.pop_scope();
    result
}

fn infer_lambda(
    infer: &mut Infer<'_>,
    params: &[Pattern],
    body: &Body,
    nullary: bool,
    span: Span,
) -> Result<Ty, TypeError> {
    if params.is_empty() {
        return infer.infer_body(body);
    }
    let ty = infer.infer_function(params, body)?;
    if nullary {
        if let Ty::Fun(param, _) = &ty {
            infer.ctx.unify(
                Ty::unit(),
                (**param).clone(),
                ConstraintOrigin::Pattern { span },
            )?;
        }
    }
    Ok(ty)
}

/// The skolems as variables, if they are still distinct and unbound.
fn rigid_vars(infer: &mut Infer<'_>, skolems: &[Ty]) -> Option<Vec<TyVar>> {
    let mut out: Vec<TyVar> = Vec::with_capacity(skolems.len());
    for skolem in skolems {
        match infer.ctx.resolve(skolem.clone()) {
            Ty::Var(v) if !out.contains(&v) => out.push(v),
            _ => return None,
        }
    }
    Some(out)
}

/// Report retained predicates the signature does not provide. Returns
/// whether anything was reported.
fn report_missing(
    infer: &mut Infer<'_>,
    solution: &Solution,
    skolems: &[TyVar],
    name: &str,
    diags: &mut Diagnostics,
) -> bool {
    let to_gens: Substitution = skolems
        .iter()
        .enumerate()
        .map(|(i, v)| (*v, Ty::Gen(i as u32)))
        .collect();
    for pending in &solution.retained {
        let pred = infer.ctx.resolve_predicate(&pending.predicate);
        diags.push(TypeError::MissingConstraint {
            predicate: pred.substitute(&to_gens),
            name: name.to_string(),
            span: pending.span,
        });
    }
    !solution.retained.is_empty()
}

/// Resolve a span to type map, turning the generalized variables into
/// the scheme's quantified variables.
fn finish_types(
    infer: &mut Infer<'_>,
    types: FxHashMap<Span, Ty>,
    generalized: &[TyVar],
) -> FxHashMap<Span, Ty> {
    let to_gens: Substitution = generalized
        .iter()
        .enumerate()
        .map(|(i, v)| (*v, Ty::Gen(i as u32)))
        .collect();
    types
        .into_iter()
        .map(|(span, ty)| (span, infer.ctx.resolve(ty).substitute(&to_gens)))
        .collect()
}

// ── Predicate solving ──────────────────────────────────────────────────

/// What remains of a body's predicates after solving.
#[derive(Debug, Default)]
struct Solution {
    /// Predicates over the kept variables, not entailed by the given ones.
    retained: Vec<PendingPredicate>,
    /// Some ambiguous predicate could not be defaulted.
    defaulting_failed: bool,
}

/// Improve, reduce and default the pending predicates of `infer`.
///
/// `keep` are the variables of the type being generalized or checked;
/// predicates over other variables are ambiguous. Predicates entailed by
/// `given` are discarded. Returns `None` after reporting an error.
fn solve(
    infer: &mut Infer<'_>,
    classes: &ClassEnv,
    keep: &[TyVar],
    given: &[TypePredicate],
    owners: &[(String, Span)],
    default_all: bool,
    diags: &mut Diagnostics,
) -> Option<Solution> {
    let pending = std::mem::take(&mut infer.preds);
    let span = owners.first().map(|(_, s)| *s).unwrap_or_default();
    let raw: Vec<TypePredicate> = pending.iter().map(|p| p.predicate.clone()).collect();
    classes.improve(&mut infer.ctx, &raw, span);
    if !infer.ctx.errors.is_empty() {
        diags.extend(std::mem::take(&mut infer.ctx.errors));
        return None;
    }

    // Reduce each predicate separately so the result keeps its span.
    let given: Vec<TypePredicate> = given.iter().map(|p| infer.ctx.resolve_predicate(p)).collect();
    let mut reduced: Vec<PendingPredicate> = Vec::new();
    let mut failed = false;
    for p in &pending {
        let pred = infer.ctx.resolve_predicate(&p.predicate);
        if classes.entails(&given, &pred) {
            continue;
        }
        match classes.reduce(std::slice::from_ref(&pred)) {
            Ok(preds) => {
                for predicate in preds {
                    if !classes.entails(&given, &predicate) {
                        reduced.push(PendingPredicate {
                            predicate,
                            span: p.span,
                        });
                    }
                }
            }
            Err(unsatisfied) => {
                diags.push(TypeError::NoInstance {
                    predicate: unsatisfied.0,
                    span: p.span,
                });
                failed = true;
            }
        }
    }
    if failed {
        return None;
    }
    let survivors = classes.simplify(reduced.iter().map(|p| p.predicate.clone()).collect());
    let reduced: Vec<PendingPredicate> = survivors
        .into_iter()
        .filter_map(|predicate| {
            let span = reduced.iter().find(|p| p.predicate == predicate)?.span;
            Some(PendingPredicate { predicate, span })
        })
        .collect();

    let mut solution = Solution::default();
    for group in group_by_variables(reduced) {
        let ambiguous = group.vars.iter().any(|v| !keep.contains(v));
        if !ambiguous && !default_all {
            solution.retained.extend(group.preds);
            continue;
        }
        match default_group(infer, classes, &group) {
            Defaulting::Defaulted(ty) => {
                trace!(default = %ty, "defaulted ambiguous predicates");
            }
            Defaulting::NoCandidates if !ambiguous => solution.retained.extend(group.preds),
            Defaulting::Failed if !ambiguous => solution.retained.extend(group.preds),
            Defaulting::NoCandidates => {
                let first = &group.preds[0];
                diags.push(TypeError::AmbiguousPredicate {
                    predicate: first.predicate.clone(),
                    name: owner_of(owners, first.span),
                    span: first.span,
                });
                return None;
            }
            Defaulting::Failed => {
                let first = &group.preds[0];
                diags.push(TypeError::AmbiguousDefault {
                    predicate: first.predicate.clone(),
                    name: owner_of(owners, first.span),
                    span: first.span,
                });
                solution.defaulting_failed = true;
            }
        }
    }
    Some(solution)
}

fn owner_of(owners: &[(String, Span)], span: Span) -> String {
    owners
        .iter()
        .find(|(_, s)| s.contains(span))
        .or_else(|| owners.first())
        .map(|(name, _)| name.clone())
        .unwrap_or_default()
}

/// Predicates connected by shared variables.
struct PredicateGroup {
    vars: Vec<TyVar>,
    preds: Vec<PendingPredicate>,
}

fn group_by_variables(preds: Vec<PendingPredicate>) -> Vec<PredicateGroup> {
    let mut groups: Vec<PredicateGroup> = Vec::new();
    for pending in preds {
        let vars = pending.predicate.free_type_variables();
        let mut merged = PredicateGroup {
            vars: vars.clone(),
            preds: vec![pending],
        };
        let mut i = 0;
        while i < groups.len() {
            if groups[i].vars.iter().any(|v| vars.contains(v)) {
                let group = groups.remove(i);
                for v in group.vars {
                    if !merged.vars.contains(&v) {
                        merged.vars.push(v);
                    }
                }
                let mut preds = group.preds;
                preds.append(&mut merged.preds);
                merged.preds = preds;
            } else {
                i += 1;
            }
        }
        groups.push(merged);
    }
    groups
}

enum Defaulting {
    Defaulted(Ty),
    /// The group is not of the form `C1 v, .., Cn v`, or no class in it
    /// has defaults.
    NoCandidates,
    /// No candidate satisfies every predicate.
    Failed,
}

fn default_group(infer: &mut Infer<'_>, classes: &ClassEnv, group: &PredicateGroup) -> Defaulting {
    let &[var] = group.vars.as_slice() else {
        return Defaulting::NoCandidates;
    };
    let simple = group
        .preds
        .iter()
        .all(|p| p.predicate.types == [Ty::Var(var)]);
    if !simple {
        return Defaulting::NoCandidates;
    }
    let mut candidates: Vec<&Ty> = Vec::new();
    for p in &group.preds {
        for ty in classes.defaults(&p.predicate.class) {
            if !candidates.contains(&ty) {
                candidates.push(ty);
            }
        }
    }
    if candidates.is_empty() {
        return Defaulting::NoCandidates;
    }
    let chosen = candidates.into_iter().find(|candidate| {
        group.preds.iter().all(|p| {
            let pred = TypePredicate::new(p.predicate.class.clone(), vec![(*candidate).clone()]);
            classes.entails(&[], &pred)
        })
    });
    match chosen {
        Some(ty) => {
            let _ = infer
                .ctx
                .unify(Ty::Var(var), ty.clone(), ConstraintOrigin::Builtin);
            Defaulting::Defaulted(ty.clone())
        }
        None => Defaulting::Failed,
    }
}

// ── Binding groups ─────────────────────────────────────────────────────

/// Names a definition's body refers to that it does not bind itself.
fn references(def: &ToplevelDefine) -> Vec<String> {
    let mut bound: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for param in &def.params {
        bind_pattern(param, &mut bound);
    }
    body_references(&def.body, &mut bound, &mut out);
    out
}

fn bind_pattern(pattern: &Pattern, bound: &mut Vec<String>) {
    bound.extend(pattern.bound_names().into_iter().map(|id| id.name.clone()));
}

fn body_references(body: &Body, bound: &mut Vec<String>, out: &mut Vec<String>) {
    for expr in &body.exprs {
        expr_references(expr, bound, out);
    }
}

fn expr_references(expr: &Expr, bound: &mut Vec<String>, out: &mut Vec<String>) {
    match expr {
        Expr::Literal(..) => {}
        Expr::Var(id) => {
            if !bound.contains(&id.name) && !out.contains(&id.name) {
                out.push(id.name.clone());
            }
        }
        Expr::App { func, args, .. } => {
            expr_references(func, bound, out);
            for arg in args {
                expr_references(arg, bound, out);
            }
        }
        Expr::Lambda { params, body, .. } => {
            let mark = bound.len();
            for param in params {
                bind_pattern(param, bound);
            }
            body_references(body, bound, out);
            bound.truncate(mark);
        }
        Expr::Let { bindings, body, .. } => {
            let mark = bound.len();
            for (name, value) in bindings {
                expr_references(value, bound, out);
                bound.push(name.name.clone());
            }
            body_references(body, bound, out);
            bound.truncate(mark);
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            expr_references(cond, bound, out);
            expr_references(then_branch, bound, out);
            expr_references(else_branch, bound, out);
        }
        Expr::Match {
            scrutinee, arms, ..
        } => {
            expr_references(scrutinee, bound, out);
            for arm in arms {
                let mark = bound.len();
                bind_pattern(&arm.pattern, bound);
                body_references(&arm.body, bound, out);
                bound.truncate(mark);
            }
        }
        Expr::Progn(body) => body_references(body, bound, out),
        Expr::The { expr, .. } => expr_references(expr, bound, out),
    }
}

// ── Phase 6: instance bodies ───────────────────────────────────────────

pub fn check_instances(
    env: &Environment,
    defs: &[ToplevelDefineInstance],
    prepared: &[PreparedInstance],
    diags: &mut Diagnostics,
) -> Vec<TypedInstance> {
    // User instances first; generated code may rely on them.
    let (user, generated): (Vec<&PreparedInstance>, Vec<&PreparedInstance>) = prepared
        .iter()
        .partition(|p| !p.instance.compiler_generated);
    let mut typed = Vec::new();
    for (pass, batch) in [("user", user), ("generated", generated)] {
        for prep in batch {
            if let Some(instance) = check_instance(env, &defs[prep.index], &prep.instance, diags) {
                typed.push(instance);
            }
        }
        debug!(pass, checked = typed.len(), "instance bodies checked");
    }
    typed
}

fn check_instance(
    env: &Environment,
    def: &ToplevelDefineInstance,
    instance: &Instance,
    diags: &mut Diagnostics,
) -> Option<TypedInstance> {
    let classes = &env.class_env;

    // Superclass instances must follow from the instance context, with
    // the instance variables held rigid.
    let rigid: Vec<Ty> = (0..instance.quantified).map(|i| Ty::Var(TyVar(i))).collect();
    let context = instance.context.instantiate(&rigid);
    let mut ok = true;
    for sup in classes.superclasses(&instance.head) {
        if !classes.entails(&context, &sup.instantiate(&rigid)) {
            diags.push(TypeError::MissingSuperclassInstance {
                instance: instance.head.clone(),
                superclass: sup,
                span: def.head_span,
            });
            ok = false;
        }
    }

    let mut methods = Vec::new();
    for method in &def.methods {
        let Some(scheme) = env.lookup_value(&method.name.name) else {
            continue;
        };
        let mut infer = Infer::new(env);
        infer.ctx.enter_level();
        let instance_vars = infer.ctx.fresh_vars(instance.quantified);
        let head = instance.head.instantiate(&instance_vars);
        let extra = infer
            .ctx
            .fresh_vars(scheme.quantified.saturating_sub(head.types.len() as u32));
        let mut fresh = head.types.clone();
        fresh.extend(extra.iter().cloned());
        let expected = scheme.instantiate(&fresh);
        let mut given = instance.context.instantiate(&instance_vars);
        given.extend(expected.predicates.iter().cloned());

        infer.env.push_scope();
        let nullary = method.orig_params.is_empty() && !method.params.is_empty();
        let inferred = infer_lambda(&mut infer, &method.params, &method.body, nullary, method.span);
        infer.env.pop_scope();
        if let Ok(ty) = inferred {
            let _ = infer.ctx.unify(
                expected.ty.clone(),
                ty,
                ConstraintOrigin::Signature {
                    name: method.name.name.clone(),
                    span: method.name.span,
                },
            );
        }
        infer.ctx.leave_level();
        if !infer.ctx.errors.is_empty() {
            diags.extend(std::mem::take(&mut infer.ctx.errors));
            ok = false;
            continue;
        }

        let mut skolems = instance_vars.clone();
        skolems.extend(extra);
        let Some(skolem_vars) = rigid_vars(&mut infer, &skolems) else {
            let display: Vec<Ty> = instance
                .head
                .types
                .iter()
                .cloned()
                .chain((instance.quantified..).map(Ty::Gen))
                .take(scheme.quantified as usize)
                .collect();
            diags.push(TypeError::SignatureTooGeneral {
                name: method.name.name.clone(),
                declared: scheme.qual.ty.instantiate(&display).to_string(),
                span: method.name.span,
            });
            ok = false;
            continue;
        };
        let owners = [(method.name.name.clone(), method.span)];
        let Some(solution) = solve(
            &mut infer,
            classes,
            &skolem_vars,
            &given,
            &owners,
            false,
            diags,
        ) else {
            ok = false;
            continue;
        };
        if report_missing(&mut infer, &solution, &skolem_vars, &method.name.name, diags)
            || solution.defaulting_failed
        {
            ok = false;
            continue;
        }
        let types = std::mem::take(&mut infer.types);
        methods.push(TypedMethod {
            name: method.name.name.clone(),
            types: finish_types(&mut infer, types, &skolem_vars),
            span: method.span,
        });
    }

    trace!(instance = %instance.head, ok, "checked instance");
    ok.then(|| TypedInstance {
        head: instance.head.clone(),
        context: instance.context.clone(),
        quantified: instance.quantified,
        methods,
        span: def.span,
        compiler_generated: instance.compiler_generated,
    })
}

// ── Phase 7: specializations ───────────────────────────────────────────

pub fn specialize(
    mut env: Environment,
    specs: &[ToplevelSpecialize],
    diags: &mut Diagnostics,
) -> Environment {
    for spec in specs {
        match check_specialization(&env, spec) {
            Ok(specialization) => {
                trace!(from = %spec.from, to = %spec.to, ty = %specialization.ty, "specialization");
                env.add_specialization(specialization);
            }
            Err(err) => diags.push(err),
        }
    }
    env
}

fn check_specialization(
    env: &Environment,
    spec: &ToplevelSpecialize,
) -> Result<Specialization, TypeError> {
    let lookup = |ident: &Ident| {
        env.lookup_value(&ident.name)
            .ok_or_else(|| TypeError::UnboundVariable {
                name: ident.name.clone(),
                span: ident.span,
            })
    };
    let from = lookup(&spec.from)?;
    let to = lookup(&spec.to)?;
    let mut vars = TypeVars::open();
    let ty = convert_type(env, &spec.ty, &mut vars)?;
    let invalid = |reason: String| TypeError::InvalidSpecialization {
        from: spec.from.name.clone(),
        to: spec.to.name.clone(),
        reason,
        span: spec.span,
    };
    // The target's own variables are rigid: they are renamed apart from
    // the schemes' quantified variables.
    let offset = from.quantified.max(to.quantified);
    let target = ty.instantiate(&(0..vars.len()).map(|i| Ty::Var(TyVar(offset + i))).collect::<Vec<_>>());
    let unbound = offset + vars.len();
    let mut bindings = vec![None; from.quantified as usize];
    if !match_type(from.ty(), &target, &mut bindings) {
        return Err(invalid(format!("`{ty}` is not an instance of `{from}`")));
    }
    if let Some(pred) = unsatisfied_at(&env.class_env, from, bindings, unbound) {
        return Err(invalid(format!("`{from}` requires `{pred}` at `{ty}`")));
    }
    let mut bindings = vec![None; to.quantified as usize];
    if !match_type(to.ty(), &target, &mut bindings) {
        return Err(invalid(format!("`{to}` is not at least as general as `{ty}`")));
    }
    if let Some(pred) = unsatisfied_at(&env.class_env, to, bindings, unbound) {
        return Err(invalid(format!("`{to}` requires `{pred}` at `{ty}`")));
    }
    if spec.from.name == spec.to.name {
        return Err(invalid("a definition cannot specialize to itself".to_string()));
    }
    Ok(Specialization {
        from: spec.from.name.clone(),
        to: spec.to.name.clone(),
        ty,
    })
}

/// The first predicate of `scheme` that no instance can satisfy once its
/// quantified variables take the matched types. Variables the match left
/// unbound stay rigid.
fn unsatisfied_at(
    classes: &ClassEnv,
    scheme: &Scheme,
    bindings: Vec<Option<Ty>>,
    unbound: u32,
) -> Option<TypePredicate> {
    let types: Vec<Ty> = bindings
        .into_iter()
        .enumerate()
        .map(|(i, ty)| ty.unwrap_or(Ty::Var(TyVar(unbound + i as u32))))
        .collect();
    scheme
        .qual
        .predicates
        .iter()
        .map(|p| p.instantiate(&types))
        .find(|p| classes.reduce(std::slice::from_ref(p)).is_err())
}
