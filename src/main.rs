use clap::{Parser, Subcommand};

mod cli;

use cli::build::BuildArgs;

#[derive(Parser)]
#[command(
    name = "barray",
    version,
    about = "barray: array expressions staged into loop-nest IR"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in sample programs
    List,
    /// Build a sample program and print its IR
    Build(BuildArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::List => cli::list::cmd_list(),
        Command::Build(args) => cli::build::cmd_build(args),
    }
}
