//! Class-to-kernel transpilation.
//!
//! Translates one host class declaration into HLSL-style compute shader
//! source. Translation is purely syntax-directed: nodes are rendered in
//! order, nothing is reordered or type-checked, and every unsupported node
//! becomes a diagnostic while the pass carries on with its siblings.
//!
//! Output layout:
//! ```text
//! #pragma kernel <entry>      one per method carrying [numthreads]
//!
//! <field declarations>
//!
//! <method blocks>
//! ```

mod expr;
mod items;
mod stmt;
mod types;

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::ast::ClassDecl;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub use types::{read_only_counterpart, translate_type_name};

/// Attribute marking a method as a dispatch entry point.
pub const ENTRY_ATTRIBUTE: &str = "numthreads";

/// Columns added per nesting level.
const INDENT_STEP: usize = 4;

/// Output of a best-effort translation.
#[derive(Clone, Debug)]
pub struct Transpiled {
    /// Kernel source text; structurally invalid when `diagnostics` has errors.
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Transpiled {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Translate a class declaration into kernel source.
///
/// `file_path` is the declaring file as it should appear in diagnostic
/// links; callers usually pass it relative to their project root.
pub fn transpile(file_path: &Path, class: &ClassDecl) -> Result<String, Vec<Diagnostic>> {
    let out = transpile_lossy(file_path, class);
    if out.has_errors() {
        Err(out.diagnostics)
    } else {
        Ok(out.source)
    }
}

/// Translate a class declaration, keeping the partial output even when some
/// nodes could not be translated.
pub fn transpile_lossy(file_path: &Path, class: &ClassDecl) -> Transpiled {
    let path = file_path.to_string_lossy().replace('\\', "/");
    let mut emitter = Emitter::new(class, &path);
    emitter.emit_class();
    Transpiled {
        source: emitter.output,
        diagnostics: emitter.diagnostics,
    }
}

/// Single-use emission state for one class: output text, indentation and
/// the diagnostics collected so far.
pub(super) struct Emitter<'a> {
    pub(super) class: &'a ClassDecl,
    pub(super) path: &'a str,
    pub(super) output: String,
    pub(super) indent: usize,
    pub(super) diagnostics: Vec<Diagnostic>,
}

impl<'a> Emitter<'a> {
    fn new(class: &'a ClassDecl, path: &'a str) -> Self {
        Self {
            class,
            path,
            output: String::new(),
            indent: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Report a node kind the transpiler does not support.
    pub(super) fn unsupported(&mut self, kind: &str, node_type: &str, span: Span) {
        self.error(
            format!("uses {} ({}) which isn't supported", kind, node_type),
            span,
        );
    }

    /// `Shader "<Class>" <reason>.` with the `path:line` link as a note.
    pub(super) fn error(&mut self, reason: String, span: Span) {
        let mut diag = Diagnostic::error(
            format!("Shader \"{}\" {}.", self.class.name.node, reason),
            span,
        )
        .in_file(self.path);
        if let Some(link) = diag.link() {
            diag = diag.with_note(link);
        }
        self.diagnostics.push(diag);
    }

    pub(super) fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push(' ');
        }
    }

    pub(super) fn push_indented_line(&mut self, text: &str) {
        self.push_indent();
        self.output.push_str(text);
        self.output.push('\n');
    }

    /// Run `f` one nesting level deeper; the previous level is restored
    /// whatever `f` emits.
    pub(super) fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.indent += INDENT_STEP;
        let result = f(self);
        self.indent -= INDENT_STEP;
        result
    }
}
