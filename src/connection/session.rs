// src/connection/session.rs

//! Defines the state associated with a single client session.

use crate::core::protocol::Features;

/// Holds the state specific to a single client session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Identifier assigned by the accept loop.
    pub session_id: u64,
    /// Capabilities negotiated with `HELLO`.
    pub features: Features,
    /// The agent string the client sent with `HELLO`, if any.
    pub agent: Option<String>,
}

impl SessionState {
    /// Creates a new `SessionState` with no negotiated features.
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }
}
