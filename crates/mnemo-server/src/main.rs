//! mnemo server
//!
//! Hierarchical memory service for AI agents, exposed over newline-delimited
//! JSON-RPC on stdio. Configuration comes from the environment; fatal
//! initialization failures exit non-zero.

use clap::Parser;
use mnemo_core::config::MnemoConfig;
use mnemo_memory::{
    build_embedder, build_vector_store, MaintenanceScheduler, MemoryManager, SchedulerConfig,
};
use mnemo_server::gateway;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// mnemo server CLI
#[derive(Parser, Debug)]
#[command(name = "mnemo-server")]
#[command(about = "Hierarchical agent memory service over stdio JSON-RPC")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays JSON-RPC clean.
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("mnemo server v{}", env!("CARGO_PKG_VERSION"));

    let config = MnemoConfig::from_env()
        .map_err(|e| anyhow::anyhow!("configuration rejected: {e}"))?;
    tracing::info!(
        vector_store = ?config.vector_store,
        embedding_provider = ?config.embedding_provider,
        "configuration loaded"
    );

    let embedder = build_embedder(&config)
        .map_err(|e| anyhow::anyhow!("embedding provider init failed: {e}"))?;
    let store = build_vector_store(&config)
        .map_err(|e| anyhow::anyhow!("vector store init failed: {e}"))?;

    let manager = Arc::new(MemoryManager::new(store, embedder, &config));
    manager
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("vector store unreachable: {e}"))?;

    let scheduler = MaintenanceScheduler::new(manager.clone(), SchedulerConfig::from_config(&config));
    scheduler.start().await;

    tracing::info!("serving tools on stdio: memory_store, memory_search, memory_recall, memory_consolidate, memory_forget, memory_list, memory_stats");

    // Run until the host closes stdin or sends an interrupt.
    tokio::select! {
        result = gateway::run_stdio(manager.clone()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "gateway transport failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
        }
    }

    scheduler.stop().await;
    if let Err(e) = manager.close().await {
        tracing::warn!(error = %e, "vector store close failed");
    }

    Ok(())
}
