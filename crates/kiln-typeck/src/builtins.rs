//! Built-in type and class registration.
//!
//! Registers the primitive types (Boolean, Unit, Integer, Double-Float,
//! String), the `List` type constructor, and the classes `Eq`, `Ord` and
//! `Num` together with their instances and the `Num` default table. User
//! programs are checked against an environment built here.

use crate::classes::{Class, Instance};
use crate::env::{ConstructorInfo, Environment, TypeInfo};
use crate::predicate::{QualifiedType, TypePredicate};
use crate::ty::{Kind, Scheme, Ty, TyCon, BOOLEAN, DOUBLE_FLOAT, INTEGER, LIST, STRING, UNIT};

/// The environment every program starts from.
pub fn prelude() -> Environment {
    let mut env = Environment::new();

    // ── Primitive types ─────────────────────────────────────────────────

    register_type(&mut env, BOOLEAN, &[], &[("True", vec![]), ("False", vec![])]);
    register_type(&mut env, UNIT, &[], &[("Unit", vec![])]);
    register_type(&mut env, INTEGER, &[], &[]);
    register_type(&mut env, DOUBLE_FLOAT, &[], &[]);
    register_type(&mut env, STRING, &[], &[]);

    // ── List ────────────────────────────────────────────────────────────

    let elem = Ty::Gen(0);
    register_type(
        &mut env,
        LIST,
        &[":a"],
        &[
            ("Cons", vec![elem.clone(), Ty::list(elem)]),
            ("Nil", vec![]),
        ],
    );

    // ── Classes ─────────────────────────────────────────────────────────

    let a = Ty::Gen(0);
    let eq_a = TypePredicate::new("Eq", vec![a.clone()]);
    let binary = |ret: Ty| Ty::fun_n([Ty::Gen(0), Ty::Gen(0)], ret);

    register_class(&mut env, "Eq", vec![], &[("==", binary(Ty::boolean()))]);
    register_class(
        &mut env,
        "Ord",
        vec![eq_a.clone()],
        &[("<", binary(Ty::boolean()))],
    );
    register_class(
        &mut env,
        "Num",
        vec![eq_a.clone()],
        &[
            ("+", binary(a.clone())),
            ("-", binary(a.clone())),
            ("*", binary(a)),
        ],
    );

    // ── Instances ───────────────────────────────────────────────────────

    for ty in [Ty::integer(), Ty::double_float()] {
        for class in ["Eq", "Ord", "Num"] {
            register_instance(&mut env, class, ty.clone());
        }
    }
    register_instance(&mut env, "Eq", Ty::string());
    register_instance(&mut env, "Ord", Ty::string());
    register_instance(&mut env, "Eq", Ty::boolean());
    env.class_env.add_instance(Instance {
        quantified: 1,
        context: vec![eq_a],
        head: TypePredicate::new("Eq", vec![Ty::list(Ty::Gen(0))]),
        span: None,
        compiler_generated: false,
    });

    env.class_env
        .set_defaults("Num", vec![Ty::integer(), Ty::double_float()]);

    env
}

fn register_type(
    env: &mut Environment,
    name: &str,
    params: &[&str],
    constructors: &[(&str, Vec<Ty>)],
) {
    let kind = Kind::from_params(&vec![Kind::Star; params.len()]);
    let result = Ty::apply(
        Ty::Con(TyCon::new(name, kind.clone())),
        (0..params.len() as u32).map(Ty::Gen),
    );
    env.insert_type(TypeInfo {
        name: name.to_string(),
        kind,
        params: params.iter().map(|p| p.to_string()).collect(),
        constructors: constructors.iter().map(|(c, _)| c.to_string()).collect(),
        repr: None,
        span: None,
    });
    for (ctor, fields) in constructors {
        let ty = Ty::fun_n(fields.clone(), result.clone());
        env.insert_constructor(ConstructorInfo {
            name: ctor.to_string(),
            type_name: name.to_string(),
            scheme: Scheme::new(params.len() as u32, QualifiedType::unqualified(ty)),
            arity: fields.len(),
            span: None,
        });
    }
}

/// Register a single-parameter class whose methods have the types given,
/// with `Gen(0)` standing for the class variable.
fn register_class(
    env: &mut Environment,
    name: &str,
    superclasses: Vec<TypePredicate>,
    methods: &[(&str, Ty)],
) {
    env.class_env.add_class(Class {
        name: name.to_string(),
        vars: vec![":a".to_string()],
        superclasses,
        fundeps: vec![],
        methods: methods.iter().map(|(m, _)| m.to_string()).collect(),
        span: None,
    });
    let self_pred = TypePredicate::new(name, vec![Ty::Gen(0)]);
    for (method, ty) in methods {
        let scheme = Scheme::new(1, QualifiedType::new(vec![self_pred.clone()], ty.clone()));
        env.insert_value(*method, scheme);
        env.insert_method(*method, name);
    }
}

fn register_instance(env: &mut Environment, class: &str, ty: Ty) {
    env.class_env.add_instance(Instance {
        quantified: 0,
        context: vec![],
        head: TypePredicate::new(class, vec![ty]),
        span: None,
        compiler_generated: false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_registers_types_and_constructors() {
        let env = prelude();
        assert_eq!(
            env.lookup_type(LIST).map(|t| t.kind.clone()),
            Some(Kind::arrow(Kind::Star, Kind::Star))
        );
        let cons = env.lookup_constructor("Cons").unwrap();
        assert_eq!(cons.arity, 2);
        assert_eq!(cons.scheme.to_string(), ":a -> List :a -> List :a");
        assert_eq!(env.lookup_value("True").unwrap().to_string(), "Boolean");
    }

    #[test]
    fn method_schemes_carry_their_class() {
        let env = prelude();
        assert_eq!(env.method_class("<"), Some("Ord"));
        assert_eq!(
            env.lookup_value("+").unwrap().to_string(),
            "Num :a => :a -> :a -> :a"
        );
    }

    #[test]
    fn num_defaults_prefer_integer() {
        let env = prelude();
        assert_eq!(
            env.class_env.defaults("Num"),
            &[Ty::integer(), Ty::double_float()]
        );
    }
}
