//! Wren command-line tool
//!
//! Runs scripts, evaluates snippets, hosts an interactive REPL and dumps
//! compiled bytecode.

mod commands;
mod loader;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wren")]
#[command(about = "Wren scripting language", long_about = None)]
#[command(version)]
struct Cli {
    /// Log VM internals (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// When to color error output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Wren script
    Run {
        /// Script to run
        file: PathBuf,
    },

    /// Evaluate a snippet and print the value of an expression
    Eval {
        /// Source code
        code: String,
    },

    /// Start an interactive REPL (the default without a command)
    Repl,

    /// Print the bytecode a script compiles to
    Disasm {
        /// Script to compile
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let color = output::resolve_color_choice(cli.color.as_deref());

    let code = match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run { file } => commands::run::execute(&file, color)?,
        Commands::Eval { code } => commands::eval::execute(&code, color)?,
        Commands::Repl => commands::repl::execute(color)?,
        Commands::Disasm { file } => commands::disasm::execute(&file, color)?,
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
