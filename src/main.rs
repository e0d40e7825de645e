// ABOUTME: Entry point for the foreman CLI application.
// ABOUTME: Parses arguments, loads settings from the environment and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use foreman::config::Settings;
use foreman::error::Result;
use foreman::output::Output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output_mode());

    match run(cli, &mut output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Dispatch a command; the process exit code on success.
async fn run(cli: Cli, output: &mut Output) -> Result<i32> {
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Run(args) => commands::run(args, settings, output).await,
        Commands::Await(args) => commands::await_success(args, settings, output).await.map(|()| 0),
    }
}
