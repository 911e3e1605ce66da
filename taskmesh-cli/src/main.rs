//! TaskMesh CLI - manager and worker entry points.
//!
//! The CLI is organized into:
//! - `Cli` / `Commands`: argument parsing (clap)
//! - `CliRunner`: common setup (logging, config, skill registration)
//! - `CliError`: centralized error handling with user-friendly messages
//!
//! Settings are loaded from `~/.taskmesh/config.ini` on startup; CLI
//! arguments override config file values when specified.

mod error;
mod runner;

use clap::{Parser, Subcommand, ValueEnum};
use runner::CliRunner;
use std::path::PathBuf;
use taskmesh::config::WorkerMode;

#[derive(Debug, Parser)]
#[command(name = "taskmesh", version, about = "Task-dispatch messenger")]
struct Cli {
    /// Alternate config file (default: ~/.taskmesh/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the manager: accept worker connections and dispatch tasks
    Manager {
        /// Listen address (overrides transport.listen_host)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides transport.listen_port)
        #[arg(long)]
        port: Option<u16>,

        /// Event-loop threads (overrides transport.io_threads)
        #[arg(long)]
        io_threads: Option<usize>,
    },

    /// Run a worker: connect to a manager and process tasks
    Worker {
        /// Manager address (overrides worker.manager_host)
        #[arg(long)]
        host: Option<String>,

        /// Manager port (overrides worker.manager_port)
        #[arg(long)]
        port: Option<u16>,

        /// Runtime strategy (overrides worker.mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Synchronous read/write loop on a dedicated thread
    Blocking,
    /// Event-loop driven coroutine runtime
    Async,
}

impl From<ModeArg> for WorkerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Blocking => WorkerMode::Blocking,
            ModeArg::Async => WorkerMode::Async,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let runner = match CliRunner::new(cli.config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Manager {
            host,
            port,
            io_threads,
        } => runner.run_manager(host, port, io_threads),
        Commands::Worker { host, port, mode } => {
            runner.run_worker(host, port, mode.map(WorkerMode::from))
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
