use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{link_root, load_source};

#[derive(Args)]
pub struct TranspileArgs {
    /// Class syntax tree (.json) exported by the parser
    pub input: PathBuf,
    /// Output kernel file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Class to translate when the file declares several
    #[arg(long)]
    pub class: Option<String>,
}

pub fn cmd_transpile(args: TranspileArgs) {
    let TranspileArgs {
        input,
        output,
        class,
    } = args;
    let mut file = load_source(&input);

    if let Some(wanted) = &class {
        file.classes.retain(|c| &c.name.node == wanted);
        if file.classes.is_empty() {
            eprintln!("error: no class '{}' in '{}'", wanted, input.display());
            process::exit(1);
        }
    }

    let (kernels, errors) = rspu::transpile_source_file(&file, link_root(&input).as_deref());
    if !errors.is_empty() {
        rspu::render_diagnostics(&errors, file.text.as_deref());
        eprintln!(
            "error: {} could not be transpiled ({} error(s))",
            input.display(),
            errors.iter().filter(|d| d.is_error()).count()
        );
        process::exit(1);
    }

    match output {
        Some(path) => {
            if kernels.len() != 1 {
                eprintln!(
                    "error: '{}' declares {} classes; pick one with --class",
                    input.display(),
                    kernels.len()
                );
                process::exit(1);
            }
            if let Err(e) = std::fs::write(&path, &kernels[0].1) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Transpiled {} -> {}", kernels[0].0, path.display());
        }
        None => {
            for (_, source) in &kernels {
                print!("{}", source);
            }
        }
    }
}
