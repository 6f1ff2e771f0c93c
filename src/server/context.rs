// src/server/context.rs

use crate::config::Config;
use crate::core::storage::StorageEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub config: Config,
    pub engine: Arc<dyn StorageEngine>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    /// One permit per client slot.
    pub connection_permits: Arc<Semaphore>,
    pub connected_clients: Arc<AtomicUsize>,
}

impl ServerContext {
    /// The address the listener actually bound, useful when port 0 was asked for.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
