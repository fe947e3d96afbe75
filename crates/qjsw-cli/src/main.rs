//! qjsw CLI - run JavaScript on QuickJS through the qjsw bridge.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;
mod loader;

#[derive(Parser)]
#[command(
    name = "qjsw",
    version,
    about = "Run JavaScript on QuickJS through the qjsw bridge",
    long_about = "Run JavaScript on QuickJS through the qjsw bridge.\n\n\
                  Run a file:      qjsw run script.js\n\
                  Eval code:       qjsw eval -p '1 + 1'\n\
                  Compile & exec:  qjsw compile app.mjs -o app.qjsc && qjsw exec app.qjsc"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script or ES module file
    Run(commands::run::RunCommand),

    /// Evaluate source given on the command line
    Eval(commands::eval::EvalCommand),

    /// Compile a script or module to bytecode
    Compile(commands::compile::CompileCommand),

    /// Execute a bytecode file
    Exec(commands::exec::ExecCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout belongs to script output
    let directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(cmd) => cmd.run(&config),
        Commands::Eval(cmd) => cmd.run(&config),
        Commands::Compile(cmd) => cmd.run(&config),
        Commands::Exec(cmd) => cmd.run(&config),
    }
}
