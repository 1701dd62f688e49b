//! Type environments.
//!
//! [`Environment`] is the global, program-wide accumulator of types,
//! constructors, classes, instances and value schemes. It is threaded
//! explicitly through the checking phases: each phase takes the previous
//! environment by value and returns the extended one.
//!
//! [`TypeEnv`] is the scope stack for local bindings inside one body.

use rustc_hash::{FxHashMap, FxHashSet};

use kiln_common::span::Span;
use kiln_parser::ast::ReprKind;

use crate::classes::ClassEnv;
use crate::ty::{Kind, Scheme, Ty};

/// A registered type constructor.
#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub name: String,
    pub kind: Kind,
    /// Parameter names in order.
    pub params: Vec<String>,
    /// Constructor names in declaration order.
    pub constructors: Vec<String>,
    pub repr: Option<ReprKind>,
    pub span: Option<Span>,
}

/// A registered data constructor.
#[derive(Clone, Debug)]
pub struct ConstructorInfo {
    pub name: String,
    pub type_name: String,
    /// `field1 -> .. -> fieldN -> T params`, or just `T params` when the
    /// constructor has no fields.
    pub scheme: Scheme,
    pub arity: usize,
    pub span: Option<Span>,
}

/// A recorded `specialize` directive.
#[derive(Clone, Debug, PartialEq)]
pub struct Specialization {
    pub from: String,
    pub to: String,
    pub ty: Ty,
}

/// The global environment.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    types: FxHashMap<String, TypeInfo>,
    constructors: FxHashMap<String, ConstructorInfo>,
    values: FxHashMap<String, Scheme>,
    /// Method name to the class that declares it.
    methods: FxHashMap<String, String>,
    monomorphize: FxHashSet<String>,
    specializations: Vec<Specialization>,
    pub class_env: ClassEnv,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Types and constructors ──────────────────────────────────────────

    pub fn insert_type(&mut self, info: TypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub(crate) fn lookup_type_mut(&mut self, name: &str) -> Option<&mut TypeInfo> {
        self.types.get_mut(name)
    }

    pub fn insert_constructor(&mut self, info: ConstructorInfo) {
        self.constructors.insert(info.name.clone(), info);
    }

    pub fn lookup_constructor(&self, name: &str) -> Option<&ConstructorInfo> {
        self.constructors.get(name)
    }

    // ── Values ──────────────────────────────────────────────────────────

    /// Bind a toplevel value, replacing any previous scheme.
    pub fn insert_value(&mut self, name: impl Into<String>, scheme: Scheme) {
        self.values.insert(name.into(), scheme);
    }

    /// Toplevel values, methods and constructors all live in one
    /// namespace. Constructors are looked up last.
    pub fn lookup_value(&self, name: &str) -> Option<&Scheme> {
        self.values
            .get(name)
            .or_else(|| self.constructors.get(name).map(|c| &c.scheme))
    }

    pub fn insert_method(&mut self, method: impl Into<String>, class: impl Into<String>) {
        self.methods.insert(method.into(), class.into());
    }

    /// The class declaring `method`, if it is a method.
    pub fn method_class(&self, method: &str) -> Option<&str> {
        self.methods.get(method).map(String::as_str)
    }

    // ── Attributes and directives ───────────────────────────────────────

    pub fn mark_monomorphize(&mut self, name: impl Into<String>) {
        self.monomorphize.insert(name.into());
    }

    pub fn is_monomorphize(&self, name: &str) -> bool {
        self.monomorphize.contains(name)
    }

    pub fn add_specialization(&mut self, spec: Specialization) {
        self.specializations.push(spec);
    }

    pub fn specializations(&self) -> &[Specialization] {
        &self.specializations
    }
}

/// A type environment: a stack of scopes mapping names to type schemes.
///
/// Lookups search from the innermost scope outward and fall back to the
/// global [`Environment`].
pub struct TypeEnv<'g> {
    global: &'g Environment,
    /// The scope stack. Index 0 is the outermost local scope.
    scopes: Vec<FxHashMap<String, Scheme>>,
}

impl<'g> TypeEnv<'g> {
    pub fn new(global: &'g Environment) -> Self {
        TypeEnv {
            global,
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn global(&self) -> &'g Environment {
        self.global
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Pop the top scope from the stack.
    ///
    /// # Panics
    ///
    /// Panics if called when only the outermost scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the outermost scope");
        self.scopes.pop();
    }

    /// Insert a binding into the current (topmost) scope.
    pub fn insert(&mut self, name: String, scheme: Scheme) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, scheme);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Scheme> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.global.lookup_value(name))
    }
}
