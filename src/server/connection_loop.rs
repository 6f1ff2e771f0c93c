// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::{ConnectionGuard, ConnectionHandler};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Resolves on the first SIGINT or SIGTERM.
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    })
}

/// Accepts connections until `shutdown` resolves, then stops every client
/// handler.
pub async fn serve(ctx: ServerContext, shutdown: impl Future<Output = ()>) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            res = ctx.listener.accept() => {
                let (socket, addr) = match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                    warn!(
                        "Rejecting connection from {}: max_clients ({}) reached",
                        addr, ctx.config.max_clients
                    );
                    continue;
                };
                info!("Accepted new connection from: {}", addr);
                if let Err(e) = socket.set_nodelay(true) {
                    warn!("Could not set TCP_NODELAY for {}: {}", addr, e);
                }

                session_id_counter = session_id_counter.wrapping_add(1);
                let session_id = session_id_counter;
                let guard =
                    ConnectionGuard::new(permit, ctx.connected_clients.clone(), session_id, addr);
                let mut handler = ConnectionHandler::new(
                    socket,
                    addr,
                    ctx.engine.clone(),
                    session_id,
                    ctx.config.max_packet_size,
                    ctx.shutdown_tx.subscribe(),
                );

                client_tasks.spawn(async move {
                    let _guard = guard;
                    if let Err(e) = handler.run().await {
                        warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                    }
                });
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all connections.");
    if ctx.shutdown_tx.send(()).is_err() {
        info!("No connections were open at shutdown.");
    }

    if tokio::time::timeout(Duration::from_secs(10), async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connections to close; aborting them.");
        client_tasks.shutdown().await;
    }
    info!("Server shutdown complete.");
}
