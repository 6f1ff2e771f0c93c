// src/core/commands/subdoc_multi.rs

//! Multi-path commands: several lookups, or several mutations, against one
//! document in one round trip.

use super::helpers::{WirePath, parse_stored, read_modify_write};
use super::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::SubdocError;
use crate::core::protocol::subdoc::{
    LookupResult, MultiPathFrame, MutationResult, encode_lookup_results, encode_multi_failure,
    encode_mutation_results,
};
use crate::core::protocol::{Opcode, Reply, Request, Status};
use crate::core::subdoc::{LookupOp, MutationOp, SubdocFlags, SubdocOp, ops};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// One lookup of a multi-lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSpec {
    pub op: LookupOp,
    pub path: WirePath,
}

/// One mutation of a multi-mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSpec {
    pub op: MutationOp,
    pub path: WirePath,
    pub value: Bytes,
    pub flags: SubdocFlags,
}

/// Lookups evaluated against one unmodified snapshot of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLookup {
    pub key: Bytes,
    pub specs: Vec<LookupSpec>,
}

/// Mutations applied in order to one evolving copy of a document and
/// committed together.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMutation {
    pub key: Bytes,
    pub specs: Vec<MutationSpec>,
    /// `0` means no CAS was supplied.
    pub cas: u64,
    pub expiry: Option<u32>,
}

fn spec_op(raw: u8) -> Result<SubdocOp, SubdocError> {
    Opcode::try_from(raw)
        .ok()
        .filter(|opcode| opcode.is_single_path_subdoc())
        .ok_or(SubdocError::InvalidArguments("spec opcode is not a single-path opcode"))
        .and_then(SubdocOp::try_from)
}

impl ParseCommand for MultiLookup {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        let frame = MultiPathFrame::decode_lookup(request)?;
        let specs = frame
            .specs
            .iter()
            .map(|spec| {
                let SubdocOp::Lookup(op) = spec_op(spec.opcode)? else {
                    return Err(SubdocError::InvalidArguments("mutation spec in a multi-lookup"));
                };
                let flags = SubdocFlags::from_bits(spec.flags)
                    .ok_or(SubdocError::InvalidArguments("unknown subdoc flags"))?;
                let path = WirePath::decode(&spec.path)?;
                SubdocOp::Lookup(op).validate(path.is_root(), &spec.value, flags)?;
                Ok(LookupSpec { op, path })
            })
            .collect::<Result<Vec<_>, SubdocError>>()?;

        Ok(Self {
            key: frame.key,
            specs,
        })
    }
}

impl ParseCommand for MultiMutation {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        let frame = MultiPathFrame::decode_mutation(request)?;
        let specs = frame
            .specs
            .into_iter()
            .map(|spec| {
                let SubdocOp::Mutation(op) = spec_op(spec.opcode)? else {
                    return Err(SubdocError::InvalidArguments("lookup spec in a multi-mutation"));
                };
                let flags = SubdocFlags::from_bits(spec.flags)
                    .ok_or(SubdocError::InvalidArguments("unknown subdoc flags"))?;
                let path = WirePath::decode(&spec.path)?;
                SubdocOp::Mutation(op).validate(path.is_root(), &spec.value, flags)?;
                Ok(MutationSpec {
                    op,
                    path,
                    value: spec.value,
                    flags,
                })
            })
            .collect::<Result<Vec<_>, SubdocError>>()?;

        Ok(Self {
            key: frame.key,
            specs,
            cas: request.cas,
            expiry: frame.expiry,
        })
    }
}

#[async_trait]
impl ExecutableCommand for MultiLookup {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        debug!(
            "Session {}: multi-lookup with {} specs",
            ctx.session.session_id,
            self.specs.len()
        );
        let document = ctx.engine.load(ctx.vbucket, &self.key).await?;
        let root = parse_stored(&document)?;

        let results: Vec<LookupResult> = self
            .specs
            .iter()
            .map(|spec| {
                match spec.path.get().and_then(|path| ops::lookup(&root, spec.op, path)) {
                    Ok(value) => LookupResult {
                        status: Status::Success,
                        value: value.unwrap_or_default(),
                    },
                    Err(e) => LookupResult {
                        status: e.status(),
                        value: Bytes::new(),
                    },
                }
            })
            .collect();

        Ok(Reply::success()
            .cas(document.cas)
            .value(encode_lookup_results(&results)))
    }
}

/// Why a multi-mutation batch stopped.
#[derive(Debug)]
enum BatchError {
    /// The document as a whole could not be processed.
    Document(SubdocError),
    /// The spec at `index` failed; nothing was committed.
    Spec { index: u8, error: SubdocError },
}

impl From<SubdocError> for BatchError {
    fn from(e: SubdocError) -> Self {
        BatchError::Document(e)
    }
}

impl MultiMutation {
    fn apply(
        &self,
        root: &mut crate::core::subdoc::Value,
    ) -> Result<Vec<MutationResult>, BatchError> {
        let mut outputs = Vec::new();
        for (index, spec) in self.specs.iter().enumerate() {
            // Decoding caps the batch at 16 specs.
            let index = index as u8;
            let output = spec
                .path
                .get()
                .and_then(|path| ops::mutate(root, spec.op, path, &spec.value, spec.flags))
                .map_err(|error| BatchError::Spec { index, error })?;
            if let Some(value) = output {
                outputs.push(MutationResult {
                    index,
                    status: Status::Success,
                    value,
                });
            }
        }
        Ok(outputs)
    }
}

#[async_trait]
impl ExecutableCommand for MultiMutation {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        debug!(
            "Session {}: multi-mutation with {} specs",
            ctx.session.session_id,
            self.specs.len()
        );
        let outcome = read_modify_write(
            ctx.engine,
            ctx.vbucket,
            &self.key,
            self.cas,
            self.expiry,
            |root| self.apply(root),
        )
        .await;

        match outcome {
            Ok(committed) => {
                Ok(Reply::mutated(committed.info).value(encode_mutation_results(&committed.output)))
            }
            Err(BatchError::Spec { index, error }) => {
                debug!("Multi-mutation spec {} failed: {}", index, error);
                Ok(Reply::with_status(Status::SubdocMultiPathFailure)
                    .value(encode_multi_failure(index, error.status())))
            }
            Err(BatchError::Document(e)) => Err(e),
        }
    }
}
