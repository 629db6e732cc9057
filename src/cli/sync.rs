use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::Args;
use rspu::config::output;
use rspu::project::Project;

use super::{load_project, load_source};

#[derive(Args)]
pub struct SyncArgs {
    /// Project directory (default: current directory, or the nearest ancestor with rspu.toml)
    pub dir: Option<PathBuf>,
}

/// Collect `*.json` syntax trees under `dir`, sorted.
fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "json") {
            out.push(path);
        }
    }
}

pub fn cmd_sync(args: SyncArgs) {
    let start = args.dir.unwrap_or_else(|| PathBuf::from("."));
    let Some(toml_path) = Project::find(&start) else {
        eprintln!(
            "error: no rspu.toml found in '{}' or its ancestors",
            start.display()
        );
        process::exit(1);
    };
    let project = load_project(&toml_path);

    if !project.source_dir.is_dir() {
        eprintln!(
            "error: source directory '{}' does not exist",
            project.source_dir.display()
        );
        process::exit(1);
    }

    let link_root = project
        .root_dir
        .canonicalize()
        .unwrap_or_else(|_| project.root_dir.clone());

    let mut files = Vec::new();
    collect_json_files(&project.source_dir, &mut files);
    files.sort();

    let mut live = BTreeSet::new();
    let mut written = 0usize;
    let mut failed = 0usize;

    for path in &files {
        let file = load_source(path);
        for class in &file.classes {
            if !class.name.node.is_empty() && !live.insert(class.name.node.clone()) {
                eprintln!(
                    "error: class '{}' is declared more than once ({})",
                    class.name.node,
                    project.relative(path).display()
                );
                failed += 1;
            }
        }

        let (kernels, errors) = rspu::transpile_source_file(&file, Some(&link_root));
        if !errors.is_empty() {
            rspu::render_diagnostics(&errors, file.text.as_deref());
            failed += 1;
        }
        for (class, source) in &kernels {
            match output::write_kernel(&project, class, source) {
                Ok(_) => written += 1,
                Err(e) => {
                    e.render(None);
                    failed += 1;
                }
            }
        }
    }

    // Failed classes keep their previous kernel file.
    match output::prune(&project, &live) {
        Ok(removed) => {
            for path in &removed {
                eprintln!("Removed stale {}", project.relative(path).display());
            }
        }
        Err(e) => {
            e.render(None);
            failed += 1;
        }
    }

    eprintln!(
        "Synced '{}': {} kernel(s) written to {}",
        project.name,
        written,
        project.relative(&project.output_dir).display()
    );
    if failed > 0 {
        eprintln!("error: {} problem(s) during sync", failed);
        process::exit(1);
    }
}
