//! ragweave — a thin demonstration binary around `ragweave_agent::Agent`.
//! There is no HTTP surface here; embedders link the library directly.

use ragweave_agent::config::Config;
use ragweave_agent::{Agent, QueryRequest};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragweave=debug,info")))
        .init();

    info!("ragweave starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load ragweave.toml: {e}");
            warn!("Copy ragweave.example.toml to ragweave.toml and edit it, then rerun.");
            return Ok(());
        }
    };

    let watch_folders = config.file_watcher.enable_file_watcher.then(|| config.file_watcher.watched_folders.clone());

    let agent = Arc::new(Agent::new(config).await?);
    info!("agent ready: providers, storage, and retrieval wired up");

    if let Some(folders) = watch_folders {
        if !folders.is_empty() {
            let _watcher = agent.watch_folders(".", &folders)?;
            info!(count = folders.len(), "file watcher started");
            // _watcher must stay alive for the process lifetime; leaking it
            // here is fine since this binary runs until the process exits.
            std::mem::forget(_watcher);
        }
    }

    let response = agent
        .query(QueryRequest { text: "What can you help me with?".to_string(), session_id: None, max_results: 5, start_new: false })
        .await?;

    info!(answer = %response.answer, sources = response.sources.len(), "sample query complete");

    Ok(())
}
