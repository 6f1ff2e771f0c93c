// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;

pub use connection_loop::{serve, shutdown_signal};
pub use context::ServerContext;
pub use initialization::setup;

/// The main server startup function: binds, then serves until SIGINT or
/// SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let server_context = setup(config).await?;
    let signal = shutdown_signal()?;
    serve(server_context, signal).await;
    Ok(())
}
