mod config;
mod shell;

use clap::Parser;
use config::Config;
use silo_core::Engine;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "silo")]
#[command(about = "Single-node chunked object storage shell")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "silo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting silo with config: {}", cli.config);

    let cfg = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let engine = match Engine::new(cfg.engine_config()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("Failed to initialize engine: {}", e);
            std::process::exit(1);
        }
    };

    // Stale chunks and outputs from a previous run are purged before
    // the shell starts accepting commands.
    if let Err(e) = engine.purge_directories().await {
        tracing::error!("Startup purge failed: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = shell::run_shell(engine).await {
        tracing::error!("Shell error: {}", e);
        std::process::exit(1);
    }
}
