//! Ariadne-based diagnostic rendering for parse and type errors.
//!
//! Renders `TypeError` and `ParseError` values into labeled reports, or
//! into one JSON object per diagnostic for tools. Type errors get a
//! secondary label when their origin has a second interesting span, and a
//! help line when there is a plausible fix.

use std::ops::Range;

use ariadne::{CharSet, Color, Config, IndexType, Label, Report, ReportKind, Source};
use serde::Serialize;

use kiln_common::diagnostic::Severity;
use kiln_common::span::{LineIndex, Span};
use kiln_parser::ParseError;

use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::PrintOptions;

/// How diagnostics are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    /// One JSON object per diagnostic instead of a report.
    pub json: bool,
    /// Unicode box drawing and type glyphs.
    pub unicode: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions {
            color: true,
            json: false,
            unicode: false,
        }
    }
}

impl DiagnosticOptions {
    /// Plain ASCII without color, for stable test output.
    pub fn colorless() -> Self {
        DiagnosticOptions {
            color: false,
            ..Self::default()
        }
    }

    pub fn json_mode() -> Self {
        DiagnosticOptions {
            color: false,
            json: true,
            unicode: false,
        }
    }

    fn print_options(&self) -> PrintOptions {
        if self.unicode {
            PrintOptions::UNICODE
        } else {
            PrintOptions::ASCII
        }
    }

    fn config(&self) -> Config {
        Config::default()
            .with_color(self.color)
            .with_index_type(IndexType::Byte)
            .with_char_set(if self.unicode {
                CharSet::Unicode
            } else {
                CharSet::Ascii
            })
    }
}

// ── Error Codes ────────────────────────────────────────────────────────

/// The stable code of each `TypeError` variant.
pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Mismatch { .. } => "E0001",
        TypeError::InfiniteType { .. } => "E0002",
        TypeError::UnboundVariable { .. } => "E0003",
        TypeError::UnknownType { .. } => "E0004",
        TypeError::UnknownClass { .. } => "E0005",
        TypeError::UnknownConstructor { .. } => "E0006",
        TypeError::ConstructorArity { .. } => "E0007",
        TypeError::KindMismatch { .. } => "E0008",
        TypeError::UnboundTypeVariable { .. } => "E0009",
        TypeError::Duplicate { .. } => "E0010",
        TypeError::InvalidRepr { .. } => "E0011",
        TypeError::SuperclassCycle { .. } => "E0012",
        TypeError::ClassArity { .. } => "E0013",
        TypeError::MethodMissingClassVariable { .. } => "E0014",
        TypeError::OverlappingInstances { .. } => "E0015",
        TypeError::FundepConflict { .. } => "E0016",
        TypeError::MissingMethod { .. } => "E0017",
        TypeError::UnknownMethod { .. } => "E0018",
        TypeError::MissingSuperclassInstance { .. } => "E0019",
        TypeError::NoInstance { .. } => "E0020",
        TypeError::MissingConstraint { .. } => "E0021",
        TypeError::AmbiguousPredicate { .. } => "E0022",
        TypeError::OrphanDeclaration { .. } => "E0023",
        TypeError::InvalidDeclaration { .. } => "E0024",
        TypeError::SignatureTooGeneral { .. } => "E0025",
        TypeError::InvalidSpecialization { .. } => "E0026",
        TypeError::AmbiguousDefault { .. } => "W0001",
    }
}

/// Code shared by every parse error.
pub const PARSE_ERROR_CODE: &str = "P0001";

// ── Labels ─────────────────────────────────────────────────────────────

/// A labeled span. The first label of a diagnostic is its primary one.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Labeled {
    span: Span,
    message: String,
}

impl Labeled {
    fn new(span: Span, message: impl Into<String>) -> Self {
        Labeled {
            span,
            message: message.into(),
        }
    }
}

/// The headline message, printed with the configured glyphs.
fn message(err: &TypeError, opts: PrintOptions) -> String {
    match err {
        TypeError::Mismatch {
            expected, found, ..
        } => format!(
            "type mismatch: expected `{}`, found `{}`",
            expected.display(opts),
            found.display(opts)
        ),
        _ => err.to_string(),
    }
}

fn labels(err: &TypeError, opts: PrintOptions) -> Vec<Labeled> {
    let primary = err.span().unwrap_or_default();
    match err {
        TypeError::Mismatch {
            expected,
            found,
            origin,
        } => {
            let expected = expected.display(opts).to_string();
            let found = found.display(opts).to_string();
            match origin {
                ConstraintOrigin::IfBranches {
                    then_span,
                    else_span,
                    ..
                } => vec![
                    Labeled::new(*else_span, format!("this is `{found}`")),
                    Labeled::new(*then_span, format!("this is `{expected}`")),
                ],
                ConstraintOrigin::MatchArms { first, arm } => vec![
                    Labeled::new(*arm, format!("this arm is `{found}`")),
                    Labeled::new(*first, format!("the first arm is `{expected}`")),
                ],
                ConstraintOrigin::Application { call, arg, index } => vec![
                    Labeled::new(*arg, format!("expected `{expected}`, found `{found}`")),
                    Labeled::new(*call, format!("in argument {} of this call", index + 1)),
                ],
                ConstraintOrigin::IfCondition { cond } => {
                    vec![Labeled::new(*cond, format!("this condition is `{found}`"))]
                }
                ConstraintOrigin::Signature { name, span } => vec![Labeled::new(
                    *span,
                    format!("`{name}` is declared as `{expected}`"),
                )],
                _ => vec![Labeled::new(
                    primary,
                    format!("expected `{expected}`, found `{found}`"),
                )],
            }
        }
        TypeError::InfiniteType { .. } => vec![Labeled::new(primary, "recursive type here")],
        TypeError::Duplicate { previous, what, .. } => {
            let mut out = vec![Labeled::new(primary, "defined again here")];
            if let Some(previous) = previous {
                out.push(Labeled::new(*previous, format!("first {what} defined here")));
            }
            out
        }
        TypeError::OverlappingInstances { previous, .. }
        | TypeError::FundepConflict { previous, .. } => {
            let mut out = vec![Labeled::new(primary, "this instance")];
            if let Some(previous) = previous {
                out.push(Labeled::new(*previous, "the existing instance"));
            }
            out
        }
        TypeError::NoInstance { predicate, .. } => vec![Labeled::new(
            primary,
            format!("`{}` is required here", predicate.display(opts)),
        )],
        TypeError::MissingConstraint { predicate, .. } => vec![Labeled::new(
            primary,
            format!("`{}` is required here", predicate.display(opts)),
        )],
        TypeError::AmbiguousPredicate { .. } | TypeError::AmbiguousDefault { .. } => {
            vec![Labeled::new(primary, "the type of this expression is ambiguous")]
        }
        _ => vec![Labeled::new(primary, err.to_string())],
    }
}

/// A suggested fix, as prose.
fn help(err: &TypeError, opts: PrintOptions) -> Option<String> {
    match err {
        TypeError::InfiniteType { .. } => {
            Some("a value cannot have a type that refers to itself".to_string())
        }
        TypeError::UnboundTypeVariable { name, context, .. } => {
            Some(format!("bind `{name}` in {context}"))
        }
        TypeError::MissingMethod { method, .. } => {
            Some(format!("add `(define ({method} ...) ...)` to the instance"))
        }
        TypeError::MissingSuperclassInstance { superclass, .. } => Some(format!(
            "define an instance for `{}` or add it to the context",
            superclass.display(opts)
        )),
        TypeError::MissingConstraint {
            predicate, name, ..
        } => Some(format!(
            "add `{}` to the declared type of `{name}`",
            predicate.display(opts)
        )),
        TypeError::AmbiguousPredicate { .. } => {
            Some("add a `(the type expr)` annotation to fix the type".to_string())
        }
        TypeError::AmbiguousDefault { name, .. } => {
            Some(format!("`{name}` is left out of the program"))
        }
        TypeError::OrphanDeclaration { name, .. } => {
            Some(format!("add a definition for `{name}` or remove the declaration"))
        }
        TypeError::SignatureTooGeneral { declared, .. } => {
            Some(format!("the body does not have type `{declared}`"))
        }
        _ => None,
    }
}

// ── JSON ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonSpan<'a> {
    start: u32,
    end: u32,
    line: u32,
    column: u32,
    label: &'a str,
}

impl<'a> JsonSpan<'a> {
    fn new(index: &LineIndex, span: Span, label: &'a str) -> Self {
        let (line, column) = index.line_col(span.start);
        JsonSpan {
            start: span.start,
            end: span.end,
            line,
            column,
            label,
        }
    }
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'a str,
    severity: String,
    message: String,
    file: &'a str,
    spans: Vec<JsonSpan<'a>>,
    fix: Option<String>,
}

fn to_json(diag: &JsonDiagnostic<'_>) -> String {
    serde_json::to_string(diag).unwrap_or_else(|err| {
        serde_json::json!({ "code": diag.code, "message": err.to_string() }).to_string()
    })
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Clamp a span to the source, widening empty spans to one character
/// where possible.
fn clamp(span: Span, source_len: usize) -> Range<usize> {
    let start = (span.start as usize).min(source_len);
    let end = (span.end as usize).min(source_len).max(start);
    if start == end {
        start..(end + 1).min(source_len)
    } else {
        start..end
    }
}

fn write_report(report: Report<'_, Range<usize>>, source: &str) -> String {
    let mut buf = Vec::new();
    if let Err(err) = report.write(Source::from(source), &mut buf) {
        return format!("failed to render diagnostic: {err}");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render a type error, as a report or as a JSON object.
pub fn render_diagnostic(
    err: &TypeError,
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let opts = options.print_options();
    let code = error_code(err);
    let message = message(err, opts);
    let labels = labels(err, opts);
    let help = help(err, opts);

    if options.json {
        let index = LineIndex::new(source);
        return to_json(&JsonDiagnostic {
            code,
            severity: err.severity().to_string(),
            message,
            file: filename,
            spans: labels
                .iter()
                .map(|l| JsonSpan::new(&index, l.span, &l.message))
                .collect(),
            fix: help,
        });
    }

    let kind = match err.severity() {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let source_len = source.len();
    let primary = clamp(labels[0].span, source_len);
    let mut builder = Report::build(kind, primary)
        .with_code(code)
        .with_message(&message)
        .with_config(options.config());
    for (i, label) in labels.iter().enumerate() {
        let color = if i == 0 { Color::Red } else { Color::Blue };
        builder.add_label(
            Label::new(clamp(label.span, source_len))
                .with_message(&label.message)
                .with_color(color),
        );
    }
    if let Some(help) = help {
        builder.set_help(help);
    }
    write_report(builder.finish(), source)
}

/// Render a parse error, as a report or as a JSON object.
pub fn render_parse_error(
    err: &ParseError,
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    if options.json {
        let index = LineIndex::new(source);
        let mut spans = vec![JsonSpan::new(&index, err.span, &err.message)];
        spans.extend(
            err.notes
                .iter()
                .map(|note| JsonSpan::new(&index, note.span, &note.message)),
        );
        let fix = err
            .suggestions
            .first()
            .map(|s| s.message.clone())
            .or_else(|| err.help.clone());
        return to_json(&JsonDiagnostic {
            code: PARSE_ERROR_CODE,
            severity: Severity::Error.to_string(),
            message: err.message.clone(),
            file: filename,
            spans,
            fix,
        });
    }

    let source_len = source.len();
    let primary = clamp(err.span, source_len);
    let mut builder = Report::build(ReportKind::Error, primary.clone())
        .with_code(PARSE_ERROR_CODE)
        .with_message(&err.message)
        .with_config(options.config())
        .with_label(
            Label::new(primary)
                .with_message(&err.message)
                .with_color(Color::Red),
        );
    for note in &err.notes {
        builder.add_label(
            Label::new(clamp(note.span, source_len))
                .with_message(&note.message)
                .with_color(Color::Blue),
        );
    }
    if let Some(help) = &err.help {
        builder.set_help(help);
    }
    for suggestion in &err.suggestions {
        let old = source.get(suggestion.span.range()).unwrap_or("");
        builder = builder.with_note(format!(
            "{}: `{}`",
            suggestion.message,
            suggestion.replacement(old)
        ));
    }
    write_report(builder.finish(), source)
}
