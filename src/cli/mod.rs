pub mod check;
pub mod sync;
pub mod transpile;

use std::path::{Path, PathBuf};
use std::process;

use rspu::ast::SourceFile;
use rspu::project::Project;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the log subscriber. `RSPU_LOG` overrides the default `warn`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("RSPU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a class syntax tree exported by the parser, or exit.
pub fn load_source(input: &Path) -> SourceFile {
    if !input.extension().is_some_and(|e| e == "json") {
        eprintln!("error: input must be a .json syntax tree exported by the parser");
        process::exit(1);
    }
    match rspu::syntax::load_source_file(input) {
        Ok(file) => file,
        Err(e) => {
            e.render(None);
            process::exit(1);
        }
    }
}

pub fn load_project(toml_path: &Path) -> Project {
    match Project::load(toml_path) {
        Ok(p) => p,
        Err(e) => {
            e.render(None);
            process::exit(1);
        }
    }
}

/// Directory diagnostic links are made relative to: the root of the project
/// enclosing `input`, if any.
pub fn link_root(input: &Path) -> Option<PathBuf> {
    let dir = input.parent().unwrap_or(Path::new("."));
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let toml_path = Project::find(&dir)?;
    toml_path.parent().map(Path::to_path_buf)
}
