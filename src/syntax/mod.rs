//! Host syntax tree consumed by the transpiler.
//!
//! The tree comes from an external parser (usually as JSON); this crate never
//! parses host source text itself.

pub mod ast;
pub mod build;
pub mod span;

use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Load a parsed source file from its JSON hand-off form.
pub fn load_source_file(path: &Path) -> Result<ast::SourceFile, Diagnostic> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Diagnostic::error(
            format!("cannot read '{}': {}", path.display(), e),
            Span::dummy(),
        )
    })?;
    parse_source_file(&content).map_err(|d| d.in_file(&path.display().to_string()))
}

/// Decode a parsed source file from JSON text.
pub fn parse_source_file(json: &str) -> Result<ast::SourceFile, Diagnostic> {
    serde_json::from_str(json).map_err(|e| {
        Diagnostic::error(
            format!("malformed syntax tree: {}", e),
            Span::at_line(e.line() as u32),
        )
    })
}
