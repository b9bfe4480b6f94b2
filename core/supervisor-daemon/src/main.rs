//! winws-supervisor: headless runner for winws strategy scripts.
//!
//! ## Subcommands
//!
//! - `list`: Strategies found in the strategy directory
//! - `status`: Whether the worker is running and which strategy was last used
//! - `start [NAME]`: Launch a strategy and supervise it until Ctrl-C
//! - `supervise`: Resume the last strategy (if enabled) and supervise until Ctrl-C
//! - `stop`: Terminate every worker process

mod logging;
mod session;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use supervisor_core::{AppPaths, StrategyCatalog, Supervisor};

#[derive(Parser)]
#[command(name = "winws-supervisor")]
#[command(about = "Launches winws strategies and restarts the worker when it dies")]
#[command(version)]
struct Cli {
    /// Strategy directory (defaults to `winws/` next to the executable)
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Settings file (defaults to `app/config/app.json` next to the executable)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available strategies
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show worker status
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Start a strategy and supervise it (last strategy when NAME is omitted)
    #[command(alias = "run")]
    Start {
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Supervise, resuming the last strategy when auto-start is enabled
    Supervise,

    /// Stop the worker
    Stop,
}

fn main() {
    let cli = Cli::parse();
    let paths = resolve_paths(&cli);
    let _logging_guard = logging::init(&paths.log_dir());

    if let Err(err) = run(cli.command, &paths) {
        tracing::error!(error = %err, "winws-supervisor failed");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn resolve_paths(cli: &Cli) -> AppPaths {
    let mut paths = AppPaths::default();
    if let Some(dir) = &cli.dir {
        paths = paths.with_strategy_dir(dir.clone());
    }
    if let Some(config) = &cli.config {
        paths = paths.with_config_file(config.clone());
    }
    paths
}

fn run(command: Commands, paths: &AppPaths) -> Result<(), String> {
    match command {
        Commands::List { json } => list(&StrategyCatalog::new(paths.strategy_dir()), json),
        Commands::Status { json } => status(paths, json),
        Commands::Start { name } => {
            let supervisor = Supervisor::from_paths(paths)?;
            let name = match name {
                Some(name) => name,
                None => supervisor
                    .last_strategy()
                    .ok_or_else(|| "No strategy given and no last strategy recorded".to_string())?,
            };
            session::run(supervisor, session::Launch::Strategy(name))
        }
        Commands::Supervise => {
            let supervisor = Supervisor::from_paths(paths)?;
            session::run(supervisor, session::Launch::ResumeLast)
        }
        Commands::Stop => {
            let mut supervisor = Supervisor::from_paths(paths)?;
            let report = supervisor.stop();
            if report.is_empty() {
                println!("No worker running");
            } else {
                println!("Stopped {} worker process(es)", report.killed);
            }
            if report.failed > 0 {
                return Err(format!(
                    "{} worker process(es) could not be terminated",
                    report.failed
                ));
            }
            Ok(())
        }
    }
}

fn list(catalog: &StrategyCatalog, as_json: bool) -> Result<(), String> {
    let strategies = catalog.list();
    if as_json {
        let payload = serde_json::to_string(&strategies).map_err(|err| err.to_string())?;
        println!("{payload}");
        return Ok(());
    }
    if strategies.is_empty() {
        println!("No strategies in {}", catalog.dir().display());
        return Ok(());
    }
    for strategy in strategies {
        if strategy.is_service() {
            println!("{} (service)", strategy.name);
        } else {
            println!("{}", strategy.name);
        }
    }
    Ok(())
}

fn status(paths: &AppPaths, as_json: bool) -> Result<(), String> {
    let mut supervisor = Supervisor::from_paths(paths)?;
    // A fresh supervisor believes nothing is running; one check adopts a live worker.
    supervisor.tick();
    let status = supervisor.status();
    let last = supervisor.last_strategy();

    if as_json {
        println!(
            "{}",
            json!({
                "is_running": status.is_running,
                "last_strategy": last,
            })
        );
        return Ok(());
    }

    let state = if status.is_running { "running" } else { "stopped" };
    println!("Worker: {state}");
    println!("Last strategy: {}", last.as_deref().unwrap_or("-"));
    Ok(())
}
