//! The macro expander interface used at toplevel.
//!
//! The toplevel parser does not know any macros itself. When a form's
//! head symbol is not a toplevel keyword it asks a [`MacroExpander`]
//! whether the symbol names a macro, and if so expands the form one step
//! and dispatches the result again.

use rustc_hash::FxHashMap;

use crate::cst::Cst;
use crate::error::ParseError;

/// Maximum number of consecutive expansions of a single toplevel form.
pub const MAX_EXPANSION_DEPTH: usize = 64;

pub trait MacroExpander {
    fn is_macro(&self, name: &str) -> bool;

    /// Expand `form`, whose head symbol is `name`, by one step.
    fn expand(&self, name: &str, form: &Cst) -> Result<Cst, ParseError>;
}

/// An expander that knows no macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMacros;

impl MacroExpander for NoMacros {
    fn is_macro(&self, _name: &str) -> bool {
        false
    }

    fn expand(&self, name: &str, form: &Cst) -> Result<Cst, ParseError> {
        Err(ParseError::new(format!("unknown macro `{name}`"), form.span()))
    }
}

type ExpandFn = Box<dyn Fn(&Cst) -> Result<Cst, ParseError> + Send + Sync>;

/// A registry of named expansion functions.
#[derive(Default)]
pub struct MacroTable {
    macros: FxHashMap<String, ExpandFn>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the expansion for `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        expand: impl Fn(&Cst) -> Result<Cst, ParseError> + Send + Sync + 'static,
    ) {
        self.macros.insert(name.into(), Box::new(expand));
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl MacroExpander for MacroTable {
    fn is_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    fn expand(&self, name: &str, form: &Cst) -> Result<Cst, ParseError> {
        match self.macros.get(name) {
            Some(expand) => expand(form),
            None => NoMacros.expand(name, form),
        }
    }
}
