// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: packet framing,
//! dispatch, and the per-session negotiated state.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::SessionState;
