//! Kiln front-end CLI.
//!
//! Provides the `kilnc` command with subcommands:
//! - `kilnc check <file>` - Parse and type-check a file, printing the
//!   inferred schemes
//!
//! Flags for `check`:
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//! - `--unicode` - Print types and reports with Unicode glyphs
//! - `--package` - Package the file belongs to
//! - `--verbose` - Log phase boundaries to stderr

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use kiln_parser::{NoMacros, DEFAULT_PACKAGE};
use kiln_typeck::diagnostics::{render_diagnostic, render_parse_error, DiagnosticOptions};
use kiln_typeck::ty::PrintOptions;

#[derive(Parser)]
#[command(name = "kilnc", version, about = "The Kiln front end")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and type-check a source file
    Check {
        /// Path to the source file
        file: PathBuf,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,

        /// Use Unicode arrows and box drawing
        #[arg(long)]
        unicode: bool,

        /// Package the file belongs to
        #[arg(long, default_value = DEFAULT_PACKAGE)]
        package: String,

        /// Log each phase to stderr
        #[arg(long, short)]
        verbose: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            file,
            json,
            no_color,
            unicode,
            package,
            verbose,
        } => {
            if verbose {
                init_logging();
            }
            let diag_opts = DiagnosticOptions {
                color: !no_color && !json,
                json,
                unicode,
            };
            match check(&file, &package, &diag_opts) {
                Ok(true) => {}
                Ok(false) => process::exit(1),
                Err(e) => {
                    if json {
                        // In JSON mode, emit the final error as JSON too.
                        let msg = serde_json::json!({
                            "code": "C0001",
                            "severity": "error",
                            "message": e,
                            "file": file.display().to_string(),
                            "spans": [],
                            "fix": null
                        });
                        eprintln!("{}", msg);
                    } else {
                        eprintln!("error: {}", e);
                    }
                    process::exit(1);
                }
            }
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Parse and check one file. Returns whether it was free of errors.
///
/// Diagnostics go to stderr; on success the scheme of every definition
/// goes to stdout.
fn check(path: &Path, package: &str, diag_opts: &DiagnosticOptions) -> Result<bool, String> {
    if !path.is_file() {
        return Err(format!("'{}' is not a file", path.display()));
    }
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let file_name = path.display().to_string();
    info!(file = %file_name, package, "checking");

    let program = match kiln_parser::parse_program_with(&source, &file_name, package, &NoMacros) {
        Ok(program) => program,
        Err(err) => {
            eprint_diagnostic(&render_parse_error(&err, &source, &file_name, diag_opts), diag_opts);
            return Ok(false);
        }
    };
    debug!(
        types = program.types.len(),
        classes = program.classes.len(),
        instances = program.instances.len(),
        defines = program.defines.len(),
        "parsed"
    );

    let typeck = kiln_typeck::check(&program);
    for error in typeck.errors.iter().chain(&typeck.warnings) {
        eprint_diagnostic(&render_diagnostic(error, &source, &file_name, diag_opts), diag_opts);
    }
    if typeck.has_errors() {
        return Ok(false);
    }

    let print = if diag_opts.unicode {
        PrintOptions::UNICODE
    } else {
        PrintOptions::ASCII
    };
    for define in &typeck.definitions {
        let scheme = define.scheme.display(print).to_string();
        if diag_opts.json {
            println!("{}", serde_json::json!({ "name": define.name, "type": scheme }));
        } else {
            println!("{} :: {}", define.name, scheme);
        }
    }
    Ok(true)
}

fn eprint_diagnostic(rendered: &str, diag_opts: &DiagnosticOptions) {
    if diag_opts.json {
        eprintln!("{}", rendered);
    } else {
        eprint!("{}", rendered);
    }
}
