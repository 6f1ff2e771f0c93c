// src/core/commands/subdoc_single.rs

//! The single-path sub-document commands (`0xc5..=0xcf`).

use super::helpers::{WirePath, parse_stored, read_modify_write};
use super::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::SubdocError;
use crate::core::protocol::subdoc::SinglePathFrame;
use crate::core::protocol::{Opcode, Reply, Request};
use crate::core::storage::DATATYPE_JSON;
use crate::core::subdoc::{LookupOp, SubdocFlags, SubdocOp, ops};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// One operation on one path of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdocCommand {
    pub op: SubdocOp,
    pub key: Bytes,
    pub path: WirePath,
    pub value: Bytes,
    pub flags: SubdocFlags,
    /// `0` means no CAS was supplied.
    pub cas: u64,
    pub expiry: Option<u32>,
}

impl ParseCommand for SubdocCommand {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        let opcode = Opcode::try_from(request.opcode).map_err(SubdocError::UnknownCommand)?;
        if !opcode.is_single_path_subdoc() {
            return Err(SubdocError::UnknownCommand(request.opcode));
        }
        let op = SubdocOp::try_from(opcode)?;
        let frame = SinglePathFrame::decode(request)?;

        let flags = SubdocFlags::from_bits(frame.flags)
            .ok_or(SubdocError::InvalidArguments("unknown subdoc flags"))?;
        let path = WirePath::decode(&frame.path)?;
        op.validate(path.is_root(), &frame.value, flags)?;
        if !op.is_mutation() && frame.expiry.is_some() {
            return Err(SubdocError::InvalidArguments("expiry not allowed on lookups"));
        }

        Ok(Self {
            op,
            key: frame.key,
            path,
            value: frame.value,
            flags,
            cas: request.cas,
            expiry: frame.expiry,
        })
    }
}

#[async_trait]
impl ExecutableCommand for SubdocCommand {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        debug!(
            "Session {}: {} on a {}-byte key",
            ctx.session.session_id,
            self.op.opcode(),
            self.key.len()
        );

        match self.op {
            SubdocOp::Lookup(op) => {
                let document = ctx.engine.load(ctx.vbucket, &self.key).await?;
                let root = parse_stored(&document)?;
                let fragment = ops::lookup(&root, op, self.path.get()?)?;

                let reply = Reply::success().cas(document.cas);
                Ok(match (op, fragment) {
                    (LookupOp::Get, Some(value)) => reply.datatype(DATATYPE_JSON).value(value),
                    _ => reply,
                })
            }
            SubdocOp::Mutation(op) => {
                let committed = read_modify_write(
                    ctx.engine,
                    ctx.vbucket,
                    &self.key,
                    self.cas,
                    self.expiry,
                    |root| ops::mutate(root, op, self.path.get()?, &self.value, self.flags),
                )
                .await?;

                let reply = Reply::mutated(committed.info);
                Ok(match committed.output {
                    Some(value) => reply.value(value),
                    None => reply,
                })
            }
        }
    }
}
