mod cli;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rspu",
    version,
    about = "rspu: compute kernels as Rust structs, transpiled to HLSL-style kernel text"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transpile a class syntax tree to kernel text
    Transpile(cli::transpile::TranspileArgs),
    /// Report diagnostics without writing output
    Check(cli::check::CheckArgs),
    /// Transpile every class of a project and prune stale kernel files
    Sync(cli::sync::SyncArgs),
}

fn main() {
    cli::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Transpile(args) => cli::transpile::cmd_transpile(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Sync(args) => cli::sync::cmd_sync(args),
    }
}
