//! CLI for the Reaper orphaned-resource cleanup engine.
//!
//! Pipeline: load config -> build registry -> resolve waves -> run lifecycle
//! -> flush state -> report.

mod config;

use clap::{Parser, Subcommand};
use config::Config;
use reaper_adapter::{Inventory, Registry};
use reaper_core::{ReaperError, ReaperResult};
use reaper_engine::{DependencyResolver, Orchestrator, RuleFilter, StateStore, TracingSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "reaper", version, about = "Dependency-aware orphaned cloud resource cleanup")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "REAPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve and print the deletion waves without executing anything.
    Plan,

    /// Execute a cleanup run.
    Run {
        /// Disable dry-run: actually quarantine and delete.
        #[arg(long, default_value_t = false)]
        execute: bool,

        /// Inventory file override.
        #[arg(long)]
        inventory: Option<PathBuf>,

        /// Print the run summary as JSON instead of the text report.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let code = match run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            match e {
                // Cycle or bad configuration: nothing was attempted.
                ReaperError::CycleDetected(_) | ReaperError::Config(_) => 2,
                _ => 1,
            }
        }
    };
    std::process::exit(code);
}

async fn run_cli() -> ReaperResult<i32> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(config.json_logs);

    match cli.command {
        Commands::Plan => {
            let registry = load_registry(&config, None)?;
            let waves = DependencyResolver::from_registry(&registry).resolve()?;
            for (index, wave) in waves.iter().enumerate() {
                println!("wave {index}: {}", wave.join(", "));
            }
            Ok(0)
        }
        Commands::Run {
            execute,
            inventory,
            json,
        } => {
            let mut config = config;
            if execute {
                config.dry_run = false;
            }
            if config.dry_run {
                tracing::info!("dry-run mode: no resource will be mutated");
            }

            let registry = Arc::new(load_registry(&config, inventory.as_deref())?);
            let store = Arc::new(load_store(config.state_file.as_deref())?);
            let filter = Arc::new(RuleFilter::new(config.filters.clone())?);

            let orchestrator = Orchestrator::new(
                registry,
                store.clone(),
                filter,
                Arc::new(TracingSink),
                config.run_config(),
            );

            let cancel = orchestrator.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling run");
                    cancel.cancel();
                }
            });

            let summary = orchestrator.run().await?;
            flush_store(config.state_file.as_deref(), &store)?;

            if json {
                let rendered = serde_json::to_string_pretty(&summary)
                    .map_err(|e| ReaperError::Internal(format!("summary serialization: {e}")))?;
                println!("{rendered}");
            } else {
                print!("{}", summary.render());
            }

            Ok(if summary.has_failures() { 1 } else { 0 })
        }
    }
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_registry(config: &Config, inventory_override: Option<&Path>) -> ReaperResult<Registry> {
    let path = inventory_override.or(config.inventory.as_deref());
    let inventory = match path {
        Some(path) => Inventory::from_path(path)?,
        None => Inventory::default(),
    };
    inventory.build_registry(Some(&config.resource_kinds))
}

fn load_store(state_file: Option<&Path>) -> ReaperResult<StateStore> {
    match state_file {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                ReaperError::State(format!("cannot read state {}: {e}", path.display()))
            })?;
            let store = StateStore::from_json(&text)?;
            tracing::info!(path = %path.display(), records = store.len(), "reloaded state snapshot");
            Ok(store)
        }
        _ => Ok(StateStore::new()),
    }
}

fn flush_store(state_file: Option<&Path>, store: &StateStore) -> ReaperResult<()> {
    let Some(path) = state_file else {
        return Ok(());
    };
    std::fs::write(path, store.to_json()?)
        .map_err(|e| ReaperError::State(format!("cannot write state {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), records = store.len(), "state snapshot flushed");
    Ok(())
}
