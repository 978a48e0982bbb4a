mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, init, render, CheckArgs, InitArgs, RenderArgs};
use config::Config;
use tracing_subscriber::EnvFilter;

/// dcstruct CLI - Render and check structural UI descriptors
#[derive(Parser, Debug)]
#[command(name = "dcstruct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a config file and an example descriptor
    Init(InitArgs),

    /// Compose a descriptor file with the headless host and print the tree
    Render(RenderArgs),

    /// Validate and compose descriptor files, reporting diagnostics
    Check(CheckArgs),
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|err| anyhow::anyhow!("Cannot get current directory: {}", err))?;
    let config = Config::load(&cwd)?;
    init_tracing(&config);

    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Render(args) => render(args, &config),
        Command::Check(args) => check(args, &cwd, &config),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
