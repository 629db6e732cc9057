use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{link_root, load_source};

#[derive(Args)]
pub struct CheckArgs {
    /// Class syntax tree (.json) exported by the parser
    pub input: PathBuf,
}

pub fn cmd_check(args: CheckArgs) {
    let file = load_source(&args.input);
    let (kernels, errors) = rspu::transpile_source_file(&file, link_root(&args.input).as_deref());

    if errors.is_empty() {
        eprintln!("OK: {} ({} kernel(s))", args.input.display(), kernels.len());
        return;
    }
    rspu::render_diagnostics(&errors, file.text.as_deref());
    process::exit(1);
}
