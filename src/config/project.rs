use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Project file name looked up by [`Project::find`].
pub const PROJECT_FILE: &str = "rspu.toml";

/// Project configuration from rspu.toml.
#[derive(Clone, Debug)]
pub struct Project {
    pub name: String,
    pub root_dir: PathBuf,
    /// Directory scanned for class syntax trees (`*.json`).
    pub source_dir: PathBuf,
    /// Directory receiving generated kernel files.
    pub output_dir: PathBuf,
    /// Generated file name prefix, e.g. `rspu-`.
    pub prefix: String,
    /// Generated file extension without the dot.
    pub extension: String,
    /// Emulated dispatch pool size; 0 uses rayon's global pool.
    pub workers: usize,
}

impl Project {
    /// Load project from an rspu.toml file.
    pub fn load(toml_path: &Path) -> Result<Project, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", toml_path.display(), e),
                Span::dummy(),
            )
        })?;

        let root_dir = toml_path.parent().unwrap_or(Path::new(".")).to_path_buf();

        // Section-aware minimal TOML parsing
        let mut name = String::new();
        let mut source = "kernels".to_string();
        let mut output = "generated".to_string();
        let mut prefix = "rspu-".to_string();
        let mut extension = "compute".to_string();
        let mut workers = 0usize;
        let mut current_section = String::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_matches('"');
            let value = strip_comment(value.trim()).trim_matches('"');

            match (current_section.as_str(), key) {
                ("project", "name") => name = value.to_string(),
                ("project", "source") => source = value.to_string(),
                ("project", "output") => output = value.to_string(),
                ("project", "prefix") => prefix = value.to_string(),
                ("project", "extension") => {
                    extension = value.trim_start_matches('.').to_string()
                }
                ("dispatch", "workers") => {
                    workers = value.parse().map_err(|_| {
                        Diagnostic::error(
                            format!("'workers' must be a non-negative integer, got '{}'", value),
                            Span::at_line(index as u32 + 1),
                        )
                        .in_file(&toml_path.display().to_string())
                    })?;
                }
                _ => {}
            }
        }

        if name.is_empty() {
            return Err(Diagnostic::error(
                format!("missing 'name' in {}", PROJECT_FILE),
                Span::dummy(),
            )
            .with_help("add `name = \"...\"` under [project]".to_string()));
        }

        Ok(Project {
            name,
            source_dir: root_dir.join(source),
            output_dir: root_dir.join(output),
            root_dir,
            prefix,
            extension,
            workers,
        })
    }

    /// Try to find an rspu.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(PROJECT_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// `<prefix><Class>.<extension>`
    pub fn kernel_file_name(&self, class: &str) -> String {
        format!("{}{}.{}", self.prefix, class, self.extension)
    }

    /// Inverse of [`Project::kernel_file_name`].
    pub fn class_of_kernel_file<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let class = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        (!class.is_empty()).then_some(class)
    }

    /// Path of a source file relative to the project root, for diagnostics.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root_dir).unwrap_or(path)
    }
}

/// Drop a trailing `# comment` outside of quotes.
fn strip_comment(value: &str) -> &str {
    let mut in_string = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return value[..i].trim_end(),
            _ => {}
        }
    }
    value
}
