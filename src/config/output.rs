//! Generated kernel files on disk.
//!
//! Every class owns exactly one `<prefix><Class>.<ext>` file in the output
//! directory. Files with the prefix whose class is gone are stale and get
//! pruned after a sync.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::project::Project;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Diagnostic {
    Diagnostic::error(
        format!("cannot {} '{}': {}", action, path.display(), e),
        Span::dummy(),
    )
}

/// Write the kernel text for `class`, creating the output directory if
/// needed. Unchanged files are left untouched.
pub fn write_kernel(project: &Project, class: &str, source: &str) -> Result<PathBuf, Diagnostic> {
    std::fs::create_dir_all(&project.output_dir)
        .map_err(|e| io_error("create", &project.output_dir, e))?;
    let path = project.output_dir.join(project.kernel_file_name(class));
    if std::fs::read_to_string(&path).is_ok_and(|existing| existing == source) {
        debug!(path = %path.display(), "kernel unchanged");
        return Ok(path);
    }
    std::fs::write(&path, source).map_err(|e| io_error("write", &path, e))?;
    debug!(path = %path.display(), "wrote kernel");
    Ok(path)
}

/// Generated files whose class is not in `live`, sorted by path.
pub fn stale_kernel_files(project: &Project, live: &BTreeSet<String>) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(&project.output_dir) else {
        return Vec::new();
    };
    let mut stale: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| {
            let name = entry.file_name();
            let class = project.class_of_kernel_file(name.to_str()?)?;
            (!live.contains(class)).then(|| entry.path())
        })
        .collect();
    stale.sort();
    stale
}

/// Delete stale generated files. Returns the paths removed.
pub fn prune(project: &Project, live: &BTreeSet<String>) -> Result<Vec<PathBuf>, Diagnostic> {
    let stale = stale_kernel_files(project, live);
    for path in &stale {
        std::fs::remove_file(path).map_err(|e| io_error("remove", path, e))?;
        debug!(path = %path.display(), "pruned stale kernel");
    }
    Ok(stale)
}
