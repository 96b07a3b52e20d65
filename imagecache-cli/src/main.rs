//! imagecache CLI - Command-line interface
//!
//! Inspects and manages the disk tier of the image cache.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::Parser;

use commands::cache::{self, CacheAction};
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "imagecache")]
#[command(version = imagecache::VERSION)]
#[command(about = "Manage the image cache's on-disk store", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CacheAction,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(cli.config.as_deref(), cli.debug)?;
    runner.log_startup(cli.command.name());

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(cache::run(cli.command, runner.config()))
}
