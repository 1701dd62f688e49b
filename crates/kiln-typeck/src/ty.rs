//! Type representation for the Kiln type system.
//!
//! Defines kinds, type constructors (`TyCon`), inference variables
//! (`TyVar`), the `Ty` enum and polymorphic schemes (`Scheme`).
//!
//! Quantified variables are `Ty::Gen(i)`, numbered positionally within
//! their scheme. Inference variables are `Ty::Var` and live in the `ena`
//! unification table owned by [`crate::unify::InferCtx`].

use std::fmt;

use crate::predicate::{QualifiedType, Types};

/// A type variable, identified by a `u32` index into the unification table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// The kind of a type: `*` for types of values, `k1 -> k2` for type
/// constructors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Star,
    Arrow(Box<Kind>, Box<Kind>),
}

impl Kind {
    pub fn arrow(from: Kind, to: Kind) -> Kind {
        Kind::Arrow(Box::new(from), Box::new(to))
    }

    /// `k1 -> k2 -> ... -> *`
    pub fn from_params(params: &[Kind]) -> Kind {
        params
            .iter()
            .rev()
            .fold(Kind::Star, |acc, k| Kind::arrow(k.clone(), acc))
    }

    /// Number of arguments before reaching `*`.
    pub fn arity(&self) -> usize {
        match self {
            Kind::Star => 0,
            Kind::Arrow(_, to) => 1 + to.arity(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "*"),
            Kind::Arrow(from, to) => match **from {
                Kind::Star => write!(f, "* -> {to}"),
                _ => write!(f, "({from}) -> {to}"),
            },
        }
    }
}

/// A named type constructor such as `Integer` or `List`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyCon {
    pub name: String,
    pub kind: Kind,
}

impl TyCon {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        TyCon {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A Kiln type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// An inference variable.
    Var(TyVar),
    /// A type constructor.
    Con(TyCon),
    /// Application of a type constructor to one argument. `Map K V` is
    /// `App(App(Map, K), V)`.
    App(Box<Ty>, Box<Ty>),
    /// A function from one argument to a result. Multi-argument functions
    /// are curried.
    Fun(Box<Ty>, Box<Ty>),
    /// The `i`th quantified variable of the enclosing scheme.
    Gen(u32),
}

pub const BOOLEAN: &str = "Boolean";
pub const UNIT: &str = "Unit";
pub const INTEGER: &str = "Integer";
pub const DOUBLE_FLOAT: &str = "Double-Float";
pub const STRING: &str = "String";
pub const LIST: &str = "List";

impl Ty {
    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con(TyCon::new(name, Kind::Star))
    }

    pub fn boolean() -> Ty {
        Ty::con(BOOLEAN)
    }

    pub fn unit() -> Ty {
        Ty::con(UNIT)
    }

    pub fn integer() -> Ty {
        Ty::con(INTEGER)
    }

    pub fn double_float() -> Ty {
        Ty::con(DOUBLE_FLOAT)
    }

    pub fn string() -> Ty {
        Ty::con(STRING)
    }

    /// `List elem`
    pub fn list(elem: Ty) -> Ty {
        let list = Ty::Con(TyCon::new(LIST, Kind::arrow(Kind::Star, Kind::Star)));
        Ty::app(list, elem)
    }

    pub fn app(head: Ty, arg: Ty) -> Ty {
        Ty::App(Box::new(head), Box::new(arg))
    }

    /// Apply `head` to each argument in turn.
    pub fn apply(head: Ty, args: impl IntoIterator<Item = Ty>) -> Ty {
        args.into_iter().fold(head, Ty::app)
    }

    pub fn fun(from: Ty, to: Ty) -> Ty {
        Ty::Fun(Box::new(from), Box::new(to))
    }

    /// `p1 -> p2 -> ... -> ret`
    pub fn fun_n<I>(params: I, ret: Ty) -> Ty
    where
        I: IntoIterator<Item = Ty>,
        I::IntoIter: DoubleEndedIterator,
    {
        params.into_iter().rev().fold(ret, |acc, p| Ty::fun(p, acc))
    }

    /// Split an application spine into its head and arguments.
    pub fn spine(&self) -> (&Ty, Vec<&Ty>) {
        let mut head = self;
        let mut args = Vec::new();
        while let Ty::App(f, a) = head {
            args.push(&**a);
            head = f;
        }
        args.reverse();
        (head, args)
    }

    /// Whether the head of the application spine is a variable.
    pub fn is_var_headed(&self) -> bool {
        matches!(self.spine().0, Ty::Var(_) | Ty::Gen(_))
    }

    /// Split a curried function type into its parameters and result.
    pub fn fun_parts(&self) -> (Vec<&Ty>, &Ty) {
        let mut params = Vec::new();
        let mut ty = self;
        while let Ty::Fun(from, to) = ty {
            params.push(&**from);
            ty = to;
        }
        (params, ty)
    }

    /// Inference variables in order of first occurrence.
    pub fn vars(&self) -> Vec<TyVar> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    pub(crate) fn collect_vars(&self, out: &mut Vec<TyVar>) {
        match self {
            Ty::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Ty::Con(_) | Ty::Gen(_) => {}
            Ty::App(a, b) | Ty::Fun(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    /// Whether any inference or quantified variable occurs in the type.
    pub fn has_variables(&self) -> bool {
        match self {
            Ty::Var(_) | Ty::Gen(_) => true,
            Ty::Con(_) => false,
            Ty::App(a, b) | Ty::Fun(a, b) => a.has_variables() || b.has_variables(),
        }
    }

    /// The kind of the type, if it can be read off without inference.
    /// Variables have no known kind.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Ty::Var(_) | Ty::Gen(_) => None,
            Ty::Con(con) => Some(con.kind.clone()),
            Ty::Fun(..) => Some(Kind::Star),
            Ty::App(head, _) => match head.kind()? {
                Kind::Arrow(_, to) => Some(*to),
                Kind::Star => None,
            },
        }
    }

    pub fn display(&self, opts: PrintOptions) -> TyDisplay<'_> {
        TyDisplay {
            ty: self,
            opts,
            position: Position::Top,
        }
    }
}

// ── Printing ───────────────────────────────────────────────────────────

/// Glyph selection for printed types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrintOptions {
    pub unicode: bool,
}

impl PrintOptions {
    pub const ASCII: PrintOptions = PrintOptions { unicode: false };
    pub const UNICODE: PrintOptions = PrintOptions { unicode: true };

    pub fn arrow(&self) -> &'static str {
        if self.unicode {
            "→"
        } else {
            "->"
        }
    }

    pub fn implies(&self) -> &'static str {
        if self.unicode {
            "⇒"
        } else {
            "=>"
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Top,
    /// Left of an arrow.
    FunArg,
    /// Argument of an application or a predicate.
    AppArg,
}

/// Printable view of a type. Application arguments and arrow operands are
/// parenthesized only where needed.
pub struct TyDisplay<'a> {
    ty: &'a Ty,
    opts: PrintOptions,
    position: Position,
}

impl<'a> TyDisplay<'a> {
    pub(crate) fn at(ty: &'a Ty, opts: PrintOptions, position: Position) -> Self {
        TyDisplay { ty, opts, position }
    }
}

/// `:a` .. `:z`, then `:t26`, `:t27`, ...
pub fn gen_name(index: u32) -> String {
    if index < 26 {
        let c = (b'a' + index as u8) as char;
        format!(":{c}")
    } else {
        format!(":t{index}")
    }
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = self.opts;
        match self.ty {
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Gen(i) => write!(f, "{}", gen_name(*i)),
            Ty::Con(con) => write!(f, "{con}"),
            Ty::App(..) => {
                let (head, args) = self.ty.spine();
                let parens = self.position == Position::AppArg;
                if parens {
                    write!(f, "(")?;
                }
                write!(f, "{}", TyDisplay::at(head, opts, Position::AppArg))?;
                for arg in args {
                    write!(f, " {}", TyDisplay::at(arg, opts, Position::AppArg))?;
                }
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
            Ty::Fun(from, to) => {
                let parens = self.position != Position::Top;
                if parens {
                    write!(f, "(")?;
                }
                write!(
                    f,
                    "{} {} {}",
                    TyDisplay::at(from, opts, Position::FunArg),
                    opts.arrow(),
                    TyDisplay::at(to, opts, Position::Top)
                )?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display(PrintOptions::ASCII))
    }
}

// ── Schemes ────────────────────────────────────────────────────────────

/// A polymorphic type scheme: `forall :a .. :n. preds => ty`.
///
/// The quantified variables are `Gen(0)..Gen(quantified)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheme {
    pub quantified: u32,
    pub qual: QualifiedType,
}

impl Scheme {
    /// A monomorphic scheme with no predicates.
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            quantified: 0,
            qual: QualifiedType::unqualified(ty),
        }
    }

    pub fn new(quantified: u32, qual: QualifiedType) -> Self {
        Scheme { quantified, qual }
    }

    pub fn ty(&self) -> &Ty {
        &self.qual.ty
    }

    /// Replace the quantified variables with `fresh`, one type each.
    ///
    /// Panics if `fresh` does not have exactly `quantified` entries.
    pub fn instantiate(&self, fresh: &[Ty]) -> QualifiedType {
        assert_eq!(
            fresh.len(),
            self.quantified as usize,
            "instantiating a scheme over {} variables with {} types",
            self.quantified,
            fresh.len()
        );
        self.qual.instantiate(fresh)
    }

    pub fn display(&self, opts: PrintOptions) -> impl fmt::Display + '_ {
        self.qual.display(opts)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qual)
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}
