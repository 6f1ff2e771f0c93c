// src/server/initialization.rs

//! Builds the storage engine and binds the listener described by a [`Config`].

use super::context::ServerContext;
use crate::config::Config;
use crate::core::storage::MemoryEngine;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tracing::info;

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    config.validate()?;
    log_startup_info(&config);

    let vbucket_map = config.storage.vbucket_map();
    let engine = Arc::new(MemoryEngine::with_vbucket_map(vbucket_map));
    info!("In-memory storage engine initialized.");

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        "subdocd listening on {}",
        listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| format!("{}:{}", config.host, config.port))
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let connection_permits = Arc::new(Semaphore::new(config.max_clients));

    Ok(ServerContext {
        config,
        engine,
        listener,
        shutdown_tx,
        connection_permits,
        connected_clients: Arc::new(AtomicUsize::new(0)),
    })
}

fn log_startup_info(config: &Config) {
    match &config.storage.owned_vbuckets {
        Some(owned) => info!(
            "Serving {} of {} vbuckets.",
            owned.len(),
            config.storage.num_vbuckets
        ),
        None => info!("Serving all {} vbuckets.", config.storage.num_vbuckets),
    }
    info!(
        "Accepting up to {} clients, packets up to {} bytes.",
        config.max_clients, config.max_packet_size
    );
}
