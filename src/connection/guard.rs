// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard holding a connection's slot.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// Keeps a client slot and the connected-clients gauge accurate for as long as
/// a connection handler runs, however it exits.
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    connected: Arc<AtomicUsize>,
    session_id: u64,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub fn new(
        permit: OwnedSemaphorePermit,
        connected: Arc<AtomicUsize>,
        session_id: u64,
        addr: SocketAddr,
    ) -> Self {
        connected.fetch_add(1, Ordering::Relaxed);
        Self {
            _permit: permit,
            connected,
            session_id,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.connected.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(
            "Session {} ({}) released; {} clients connected",
            self.session_id, self.addr, remaining
        );
    }
}
