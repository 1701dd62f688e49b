//! The toplevel parser.
//!
//! [`ToplevelParser`] consumes one CST form at a time, in program order.
//! Each form is dispatched on its leading symbol: definitions are parsed
//! into their [`Program`] shape, attributes are buffered until the next
//! definition consumes them, `progn` is flattened, and any other head
//! symbol is tried as a macro.

mod classes;
mod definitions;
mod expressions;
mod types;

use kiln_common::diagnostic::Suggestion;
use kiln_common::span::Span;

use crate::ast::{AttrMonomorphize, AttrRepr, Attribute, Ident, Program};
use crate::cst::{is_keyword, Cst};
use crate::error::ParseError;
use crate::macros::{MacroExpander, MAX_EXPANSION_DEPTH};

// ── Shared helpers ──────────────────────────────────────────────────────

/// A plain name: a symbol that is neither a keyword nor a separator.
pub(crate) fn ident(cst: &Cst) -> Result<Ident, ParseError> {
    match cst.as_symbol() {
        Some(name) if !is_keyword(name) && name != types::IMPLIES && name != types::ARROW => {
            Ok(Ident::new(name, cst.span()))
        }
        _ => Err(ParseError::new("expected a name", cst.span())),
    }
}

/// The span covering a run of sibling forms.
pub(crate) fn items_span(items: &[Cst]) -> Span {
    match (items.first(), items.last()) {
        (Some(first), Some(last)) => first.span().merge(last.span()),
        _ => Span::default(),
    }
}

/// Strip a leading docstring from the forms following a head.
pub(crate) fn leading_docstring(forms: &[Cst]) -> (Option<String>, &[Cst]) {
    match forms.split_first() {
        Some((doc, rest)) => match doc.as_string() {
            Some(s) => (Some(s.to_string()), rest),
            None => (None, forms),
        },
        None => (None, forms),
    }
}

// ── Classification ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Toplevel {
    Declare,
    Define,
    DefineType,
    DefineClass,
    DefineInstance,
    Specialize,
    Monomorphize,
    Repr,
    Progn,
    Macro(String),
    Invalid,
}

fn classify(form: &Cst, macros: &dyn MacroExpander) -> Toplevel {
    match form.head_symbol() {
        Some("declare") => Toplevel::Declare,
        Some("define") => Toplevel::Define,
        Some("define-type") => Toplevel::DefineType,
        Some("define-class") => Toplevel::DefineClass,
        Some("define-instance") => Toplevel::DefineInstance,
        Some("specialize") => Toplevel::Specialize,
        Some("monomorphize") => Toplevel::Monomorphize,
        Some("repr") => Toplevel::Repr,
        Some("progn") => Toplevel::Progn,
        Some(name) if macros.is_macro(name) => Toplevel::Macro(name.to_string()),
        _ => Toplevel::Invalid,
    }
}

/// Where a toplevel form is in the expansion pipeline.
enum Stage<'a> {
    /// The form as read from source.
    Unexpanded(&'a Cst),
    /// The result of `depth` expansions, the first by `macro_name`.
    Expanded {
        form: Cst,
        macro_name: String,
        depth: usize,
    },
}

// ── Parser ──────────────────────────────────────────────────────────────

/// Builds a [`Program`] from toplevel forms.
///
/// Attributes are held in a pending buffer until the next definition
/// that can use them. [`ToplevelParser::finish`] rejects any attribute
/// still pending at end of input.
pub struct ToplevelParser<'m> {
    program: Program,
    pending: Vec<Attribute>,
    macros: &'m dyn MacroExpander,
}

impl<'m> ToplevelParser<'m> {
    pub fn new(program: Program, macros: &'m dyn MacroExpander) -> Self {
        Self {
            program,
            pending: Vec::new(),
            macros,
        }
    }

    /// Attributes parsed but not yet attached to a definition.
    pub fn pending(&self) -> &[Attribute] {
        &self.pending
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Parse one toplevel form.
    ///
    /// Returns `true` if the form was consumed into the program (the
    /// pending buffer is then empty) and `false` if it was buffered as an
    /// attribute.
    pub fn parse_form(&mut self, form: &Cst) -> Result<bool, ParseError> {
        self.parse_form_at(form, 0)
    }

    /// Parse a form that is already `base` expansions deep. Forms inside
    /// an expanded `progn` count from their parent's depth.
    fn parse_form_at(&mut self, form: &Cst, base: usize) -> Result<bool, ParseError> {
        let mut stage = Stage::Unexpanded(form);
        let shape = loop {
            let (current, depth) = match &stage {
                Stage::Unexpanded(form) => (*form, base),
                Stage::Expanded { form, depth, .. } => (form, *depth),
            };
            let name = match classify(current, self.macros) {
                Toplevel::Macro(name) => name,
                shape => break shape,
            };
            if depth >= MAX_EXPANSION_DEPTH {
                return Err(ParseError::new(
                    format!("macro `{name}` exceeded the expansion limit of {MAX_EXPANSION_DEPTH}"),
                    form.span(),
                )
                .with_help("a macro that expands to itself never terminates"));
            }
            tracing::trace!(macro_name = %name, depth, "expanding toplevel macro");
            let expanded = self
                .macros
                .expand(&name, current)
                .map_err(|err| err.with_note(format!("in expansion of macro `{name}`"), form.span()))?;
            let macro_name = match stage {
                Stage::Expanded { macro_name, .. } => macro_name,
                Stage::Unexpanded(_) => name,
            };
            stage = Stage::Expanded {
                form: expanded,
                macro_name,
                depth: depth + 1,
            };
        };

        match &stage {
            Stage::Unexpanded(current) => self.dispatch(shape, current, base),
            Stage::Expanded {
                form: current,
                macro_name,
                depth,
            } => self.dispatch(shape, current, *depth).map_err(|err| {
                err.with_note(format!("in expansion of macro `{macro_name}`"), form.span())
            }),
        }
    }

    /// Check the pending buffer is empty and hand back the program.
    pub fn finish(self) -> Result<Program, ParseError> {
        if let Some(orphan) = self.pending.first() {
            return Err(orphan_error(orphan)
                .with_help("an attribute must be followed by a definition it applies to"));
        }
        Ok(self.program)
    }

    fn dispatch(&mut self, shape: Toplevel, form: &Cst, depth: usize) -> Result<bool, ParseError> {
        match shape {
            Toplevel::Declare => {
                let declare = definitions::parse_declare(form)?;
                let mono = self.take_monomorphize(form, "declare")?;
                self.program.declares.push(declare.with_monomorphize(mono));
            }
            Toplevel::Define => {
                let define = definitions::parse_define(form)?;
                let mono = self.take_monomorphize(form, "define")?;
                self.program.defines.push(define.with_monomorphize(mono));
            }
            Toplevel::DefineType => {
                let ty = definitions::parse_define_type(form)?;
                let repr = self.take_repr(form)?;
                self.program.types.push(ty.with_repr(repr));
            }
            Toplevel::DefineClass => {
                let class = classes::parse_define_class(form)?;
                self.reject_attributes(form, "define-class")?;
                self.program.classes.push(class);
            }
            Toplevel::DefineInstance => {
                let instance = classes::parse_define_instance(form)?;
                self.reject_attributes(form, "define-instance")?;
                self.program.instances.push(instance);
            }
            Toplevel::Specialize => {
                let specialize = definitions::parse_specialize(form)?;
                self.reject_attributes(form, "specialize")?;
                self.program.specializations.push(specialize);
            }
            Toplevel::Monomorphize => {
                let attr = definitions::parse_monomorphize(form)?;
                self.pending.push(Attribute::Monomorphize(attr));
                return Ok(false);
            }
            Toplevel::Repr => {
                let attr = definitions::parse_repr(form)?;
                self.pending.push(Attribute::Repr(attr));
                return Ok(false);
            }
            Toplevel::Progn => return self.parse_progn(form, depth),
            Toplevel::Macro(_) | Toplevel::Invalid => return Err(invalid_toplevel(form)),
        }
        Ok(true)
    }

    /// Children share the enclosing pending buffer; anything left pending
    /// when the group closes is an orphan.
    fn parse_progn(&mut self, form: &Cst, depth: usize) -> Result<bool, ParseError> {
        for child in form.rest() {
            self.parse_form_at(child, depth)?;
        }
        if let Some(orphan) = self.pending.first() {
            return Err(orphan_error(orphan).with_note("at the end of this progn", form.span()));
        }
        Ok(true)
    }

    fn take_monomorphize(
        &mut self,
        target: &Cst,
        what: &str,
    ) -> Result<Option<AttrMonomorphize>, ParseError> {
        let mut found: Option<AttrMonomorphize> = None;
        for attr in std::mem::take(&mut self.pending) {
            match attr {
                Attribute::Monomorphize(mono) => {
                    if let Some(prev) = &found {
                        return Err(duplicate_error("monomorphize", mono.span, prev.span, target));
                    }
                    found = Some(mono);
                }
                other => return Err(invalid_target(&other, target, what)),
            }
        }
        Ok(found)
    }

    fn take_repr(&mut self, target: &Cst) -> Result<Option<AttrRepr>, ParseError> {
        let mut found: Option<AttrRepr> = None;
        for attr in std::mem::take(&mut self.pending) {
            match attr {
                Attribute::Repr(repr) => {
                    if let Some(prev) = &found {
                        return Err(duplicate_error("repr", repr.span, prev.span, target));
                    }
                    found = Some(repr);
                }
                other => return Err(invalid_target(&other, target, "define-type")),
            }
        }
        Ok(found)
    }

    fn reject_attributes(&mut self, target: &Cst, what: &str) -> Result<(), ParseError> {
        match std::mem::take(&mut self.pending).first() {
            Some(attr) => Err(invalid_target(attr, target, what)),
            None => Ok(()),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

fn invalid_toplevel(form: &Cst) -> ParseError {
    let err = ParseError::new("invalid toplevel form", form.span());
    match form.head_symbol() {
        Some(name) => err.with_help(format!(
            "`{name}` is not a toplevel keyword or a known macro"
        )),
        None => err.with_help("toplevel forms start with a keyword such as `define`"),
    }
}

fn orphan_error(attr: &Attribute) -> ParseError {
    ParseError::new(
        format!("orphan `{}` attribute", attr.name()),
        attr.span(),
    )
    .with_suggestion(Suggestion::remove("remove the attribute", attr.span()))
}

fn duplicate_error(name: &str, span: Span, previous: Span, target: &Cst) -> ParseError {
    ParseError::new(format!("duplicate `{name}` attribute"), span)
        .with_note("previous attribute here", previous)
        .with_note("attached to this definition", target.span())
        .with_suggestion(Suggestion::remove("remove the duplicate", span))
}

fn invalid_target(attr: &Attribute, target: &Cst, what: &str) -> ParseError {
    ParseError::new(
        format!("invalid target for `{}` attribute", attr.name()),
        attr.span(),
    )
    .with_note(format!("`{}` cannot be applied to {what}", attr.name()), target.span())
}
