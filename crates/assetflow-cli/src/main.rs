#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;
mod server;

use assetflow_core::{config, Mode};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "assetflow")]
#[command(author, version, about = "Watch-driven SCSS/ES6/TypeScript builds behind a live-reloading proxy", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted logs (and a JSON summary for `build`)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file (default: assetflow.json in the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Watch and serve in development mode, whatever the config says
    Development,

    /// Run every pipeline once and exit
    Build {
        /// Override the configured mode (development or production)
        #[arg(long)]
        mode: Option<Mode>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = dunce::canonicalize(&cwd).into_diagnostic()?;

    logging::init(cli.verbose, cli.json);

    let loaded = config::load(&cwd, cli.config.as_deref()).into_diagnostic()?;

    match cli.command {
        None => {
            let span = tracing::info_span!("default", cwd = %cwd.display());
            let _guard = span.enter();
            commands::watch::run(loaded)
        }
        Some(Commands::Development) => {
            let span = tracing::info_span!("development", cwd = %cwd.display());
            let _guard = span.enter();
            let loaded = config::LoadedConfig {
                config: loaded.config.with_mode(Mode::Development),
                ..loaded
            };
            commands::watch::run(loaded)
        }
        Some(Commands::Build { mode }) => {
            let span = tracing::info_span!("build", cwd = %cwd.display());
            let _guard = span.enter();
            commands::build::run(loaded, mode, cli.json)
        }
    }
}
