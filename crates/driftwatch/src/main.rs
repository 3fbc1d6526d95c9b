//! Standalone runner keeping the configured repository pairs under watch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use driftwatch::store::default_database_path;
use driftwatch::{
    init_logging, load_config, CommandGitClient, ConfigError, DriftWatcher, DriftwatchError,
    NamespacedName, ResourceStore, Result, SqliteStore, WatcherConfig,
};

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(about = "Detects drift between origin repositories and their mirrors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch every configured pair until interrupted
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the recorded conditions of a pair as JSON
    Status {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Pair name
        #[arg(long)]
        name: String,

        /// Pair namespace
        #[arg(long, default_value = "default")]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(load_config(config)?).await,
        Command::Status {
            config,
            name,
            namespace,
        } => status(load_config(config)?, &name, &namespace).await,
    }
}

fn open_store(config: &WatcherConfig) -> Result<SqliteStore> {
    let path = config
        .database_path
        .clone()
        .or_else(default_database_path)
        .ok_or_else(|| ConfigError::Validation {
            message: "databasePath is not set and no home directory was found".to_string(),
        })?;
    Ok(SqliteStore::open(&path)?)
}

async fn run(config: WatcherConfig) -> Result<()> {
    init_logging(&config.logging)?;
    let store = open_store(&config)?;

    let watcher = DriftWatcher::new(Arc::new(store.clone()), Arc::new(CommandGitClient::new()));
    for pair in &config.pairs {
        store.ensure(&pair.key()).await?;
        watcher.add(
            &pair.name,
            &pair.namespace,
            &pair.origin,
            &pair.target,
            &pair.target_revision,
            config.interval_for(pair),
        )?;
    }

    log::info!("Watching {} repository pair(s)", watcher.len());
    let handle = watcher.watch()?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutting down");
    handle.shutdown().await;

    Ok(())
}

async fn status(config: WatcherConfig, name: &str, namespace: &str) -> Result<()> {
    let store = open_store(&config)?;
    let resource = store.get(&NamespacedName::new(name, namespace)).await?;

    let json = serde_json::to_string_pretty(&resource.status.conditions)
        .map_err(|e| DriftwatchError::Store(e.into()))?;
    println!("{}", json);
    Ok(())
}
