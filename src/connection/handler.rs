// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::session::SessionState;
use crate::core::SubdocError;
use crate::core::commands::dispatch;
use crate::core::protocol::ServerCodec;
use crate::core::storage::StorageEngine;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Reads requests off one client stream, runs them in arrival order and writes
/// one response per request.
pub struct ConnectionHandler<S> {
    framed: Framed<S, ServerCodec>,
    addr: SocketAddr,
    engine: Arc<dyn StorageEngine>,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        engine: Arc<dyn StorageEngine>,
        session_id: u64,
        max_packet_size: usize,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Framed::new(stream, ServerCodec::new(max_packet_size)),
            addr,
            engine,
            shutdown_rx,
            session: SessionState::new(session_id),
        }
    }

    /// The main event loop for the connection. Returns when the peer hangs up,
    /// the stream breaks or the server shuts down.
    pub async fn run(&mut self) -> Result<(), SubdocError> {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Connection handler for {} received shutdown signal.", self.addr);
                    break;
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(request)) => {
                            debug!(
                                "Session {}: opcode 0x{:02x}, opaque {}",
                                self.session.session_id, request.opcode, request.opaque
                            );
                            let response =
                                dispatch(self.engine.as_ref(), &mut self.session, &request).await;
                            self.framed.send(response).await?;
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                                break;
                            }
                            warn!("Dropping connection from {}: {}", self.addr, e);
                            return Err(e);
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &SubdocError) -> bool {
    matches!(e, SubdocError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
