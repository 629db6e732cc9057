pub mod config;
pub mod diagnostic;
pub mod gpu;
pub mod runtime;
pub mod syntax;
pub mod transpile;

// Re-exports: keep `crate::ast` / `crate::span` paths short
pub use syntax::ast;
pub use syntax::span;

pub use config::project;

// Re-export public API: `rspu::transpile()`, `rspu::Dispatcher` etc.
pub use diagnostic::{render_diagnostics, Diagnostic};
pub use gpu::{HostBackend, KernelBackend, WgpuBackend};
pub use runtime::{
    DispatchError, DispatchPath, Dispatcher, Float4, KernelBuilder, KernelClass, RWStructuredBuffer,
    RWTexture2D, Uint2, Uint3,
};
pub use transpile::{transpile, transpile_lossy, Transpiled};

use std::path::Path;

/// Transpile every class of a source file. Returns `(class name, kernel
/// text)` for the classes that translated cleanly, plus the diagnostics of
/// the ones that did not.
///
/// With a `root`, diagnostic links are relative to it whenever the file's
/// path lies under it.
pub fn transpile_source_file(
    file: &ast::SourceFile,
    root: Option<&Path>,
) -> (Vec<(String, String)>, Vec<Diagnostic>) {
    let full = Path::new(&file.path);
    let path = root.and_then(|root| full.strip_prefix(root).ok()).unwrap_or(full);
    let mut kernels = Vec::new();
    let mut failed = Vec::new();
    for class in &file.classes {
        if class.name.node.is_empty() {
            failed.push(
                Diagnostic::error("class declaration has no name".to_string(), class.name.span)
                    .in_file(&path.to_string_lossy())
                    .with_help("the syntax tree must name every class; re-export it from the parser".to_string()),
            );
            continue;
        }
        match transpile(path, class) {
            Ok(source) => kernels.push((class.name.node.clone(), source)),
            Err(errors) => failed.extend(errors),
        }
    }
    (kernels, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build;

    #[test]
    fn test_source_file_keeps_good_classes() {
        let good = build::class("Good", vec![]);
        let mut unnamed = build::class("", vec![]);
        unnamed.name.span = span::Span::at_line(7);
        let file = ast::SourceFile {
            path: "Kernels/Mixed.cs".to_string(),
            text: None,
            classes: vec![good, unnamed],
        };
        let (kernels, failed) = transpile_source_file(&file, None);
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].0, "Good");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].link().as_deref(), Some("Kernels/Mixed.cs:7"));
    }

    #[test]
    fn test_source_file_links_are_root_relative() {
        let mut unnamed = build::class("", vec![]);
        unnamed.name.span = span::Span::at_line(3);
        let file = ast::SourceFile {
            path: "/work/game/Kernels/Blur.cs".to_string(),
            text: None,
            classes: vec![unnamed],
        };
        let (_, failed) = transpile_source_file(&file, Some(Path::new("/work/game")));
        assert_eq!(failed[0].link().as_deref(), Some("Kernels/Blur.cs:3"));

        // Outside the root the path is kept as is.
        let (_, failed) = transpile_source_file(&file, Some(Path::new("/elsewhere")));
        assert_eq!(failed[0].link().as_deref(), Some("/work/game/Kernels/Blur.cs:3"));
    }
}
