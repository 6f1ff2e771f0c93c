// src/core/commands/mod.rs

//! Typed commands decoded from request packets, and the dispatcher that runs
//! them and shapes the reply for the calling session.

pub mod helpers;
pub mod hello;
pub mod kv;
pub mod subdoc_multi;
pub mod subdoc_single;

use crate::connection::SessionState;
use crate::core::SubdocError;
use crate::core::protocol::{Opcode, Reply, Request, Response};
use crate::core::storage::StorageEngine;
use async_trait::async_trait;
use tracing::debug;

pub use hello::Hello;
pub use kv::{Delete, Get, Noop, Set};
pub use subdoc_multi::{LookupSpec, MultiLookup, MultiMutation, MutationSpec};
pub use subdoc_single::SubdocCommand;

/// Everything a command may touch while it runs.
pub struct ExecutionContext<'a> {
    pub engine: &'a dyn StorageEngine,
    pub session: &'a mut SessionState,
    /// The vbucket named in the request header.
    pub vbucket: u16,
}

/// Builds a typed command from a request packet.
pub trait ParseCommand: Sized {
    fn parse(request: &Request) -> Result<Self, SubdocError>;
}

/// Runs a typed command.
#[async_trait]
pub trait ExecutableCommand {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError>;
}

/// Every command the server understands.
#[derive(Debug, Clone)]
pub enum Command {
    Get(Get),
    Set(Set),
    Delete(Delete),
    Noop(Noop),
    Hello(Hello),
    Subdoc(SubdocCommand),
    MultiLookup(MultiLookup),
    MultiMutation(MultiMutation),
}

impl ParseCommand for Command {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        let opcode = Opcode::try_from(request.opcode).map_err(SubdocError::UnknownCommand)?;
        let command = match opcode {
            Opcode::Get => Command::Get(Get::parse(request)?),
            Opcode::Set => Command::Set(Set::parse(request)?),
            Opcode::Delete => Command::Delete(Delete::parse(request)?),
            Opcode::Noop => Command::Noop(Noop::parse(request)?),
            Opcode::Hello => Command::Hello(Hello::parse(request)?),
            Opcode::SubdocMultiLookup => Command::MultiLookup(MultiLookup::parse(request)?),
            Opcode::SubdocMultiMutation => Command::MultiMutation(MultiMutation::parse(request)?),
            _ => Command::Subdoc(SubdocCommand::parse(request)?),
        };
        Ok(command)
    }
}

#[async_trait]
impl ExecutableCommand for Command {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        match self {
            Command::Get(cmd) => cmd.execute(ctx).await,
            Command::Set(cmd) => cmd.execute(ctx).await,
            Command::Delete(cmd) => cmd.execute(ctx).await,
            Command::Noop(cmd) => cmd.execute(ctx).await,
            Command::Hello(cmd) => cmd.execute(ctx).await,
            Command::Subdoc(cmd) => cmd.execute(ctx).await,
            Command::MultiLookup(cmd) => cmd.execute(ctx).await,
            Command::MultiMutation(cmd) => cmd.execute(ctx).await,
        }
    }
}

/// Decodes, executes and answers one request on behalf of `session`.
///
/// Errors never escape: each one becomes a status-only response.
pub async fn dispatch(
    engine: &dyn StorageEngine,
    session: &mut SessionState,
    request: &Request,
) -> Response {
    let result = match Command::parse(request) {
        Ok(command) => {
            let mut ctx = ExecutionContext {
                engine,
                session: &mut *session,
                vbucket: request.vbucket,
            };
            command.execute(&mut ctx).await
        }
        Err(e) => Err(e),
    };

    let reply = result.unwrap_or_else(|e| {
        debug!(
            "Session {}: opcode 0x{:02x} failed: {}",
            session.session_id, request.opcode, e
        );
        Reply::with_status(e.status())
    });
    reply.into_response(request, session.features)
}
