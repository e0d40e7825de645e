// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the run and await subcommands and their shared remote flags.

use clap::{Args, Parser, Subcommand};
use foreman::output::OutputMode;
use foreman::types::EnvAssignment;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Launch, supervise and await processes on this host or over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

/// Where to run the program; this host when `--host` is absent.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Run on this host over SSH
    #[arg(long)]
    pub host: Option<String>,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// SSH user (defaults to $USER)
    #[arg(long, requires = "host")]
    pub user: Option<String>,

    /// Private key to authenticate with (defaults to the SSH agent)
    #[arg(long, requires = "host")]
    pub identity: Option<PathBuf>,

    /// Accept and remember unknown host keys
    #[arg(long, requires = "host")]
    pub trust_on_first_use: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program to completion and exit with its exit code
    Run(RunArgs),

    /// Re-run a program until it exits with status 0
    Await(AwaitArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Working directory for the program
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Environment variable for the program (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<EnvAssignment>,

    /// Kill the program if it runs longer than this (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Leave the program running if foreman stops first
    #[arg(long)]
    pub allow_orphans: bool,

    /// Program and arguments
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AwaitArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Give up after this long [default: FOREMAN_ENSURE_TIMEOUT, or 30s]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub within: Option<Duration>,

    /// Pause between attempts [default: 1s, capped by FOREMAN_ENSURE_MAX_POLL]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub every: Option<Duration>,

    /// Program and arguments
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}
