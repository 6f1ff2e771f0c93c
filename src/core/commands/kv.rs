// src/core/commands/kv.rs

//! Whole-document commands used to seed and inspect the store around the
//! sub-document operations.

use super::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::SubdocError;
use crate::core::protocol::subdoc::KEY_MAX_LENGTH;
use crate::core::protocol::{Reply, Request};
use crate::core::storage::{MAX_DOCUMENT_SIZE, StoreRequest};
use crate::core::storage::expiry::{to_absolute, unix_now};
use async_trait::async_trait;
use bytes::{Buf, Bytes};

fn checked_key(request: &Request) -> Result<Bytes, SubdocError> {
    if request.key.is_empty() || request.key.len() > KEY_MAX_LENGTH {
        return Err(SubdocError::InvalidArguments("key length out of range"));
    }
    Ok(request.key.clone())
}

/// Fetches a whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct Get {
    pub key: Bytes,
}

impl ParseCommand for Get {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        if !request.extras.is_empty() || !request.value.is_empty() {
            return Err(SubdocError::InvalidArguments("GET takes only a key"));
        }
        Ok(Get {
            key: checked_key(request)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Get {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        let document = ctx.engine.load(ctx.vbucket, &self.key).await?;
        Ok(Reply::success()
            .cas(document.cas)
            .datatype(document.datatype)
            .extras(Bytes::copy_from_slice(&document.flags.to_be_bytes()))
            .value(document.value))
    }
}

/// Stores a whole document, unconditionally or guarded by CAS.
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub datatype: u8,
    pub flags: u32,
    pub expiry: u32,
    /// `0` means no CAS was supplied.
    pub cas: u64,
}

impl ParseCommand for Set {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        if request.extras.len() != 8 {
            return Err(SubdocError::InvalidArguments("SET requires 8 bytes of extras"));
        }
        if request.value.len() > MAX_DOCUMENT_SIZE {
            return Err(SubdocError::ValueTooLarge);
        }
        let mut extras = &request.extras[..];
        let flags = extras.get_u32();
        let expiry = extras.get_u32();
        Ok(Set {
            key: checked_key(request)?,
            value: request.value.clone(),
            datatype: request.datatype,
            flags,
            expiry,
            cas: request.cas,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Set {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        let request = StoreRequest {
            value: self.value.clone(),
            datatype: self.datatype,
            expected_cas: (self.cas != 0).then_some(self.cas),
            flags: self.flags,
            expiry: to_absolute(self.expiry, unix_now()),
        };
        let info = ctx.engine.store(ctx.vbucket, &self.key, request).await?;
        Ok(Reply::mutated(info))
    }
}

/// Removes a whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub key: Bytes,
    /// `0` means no CAS was supplied.
    pub cas: u64,
}

impl ParseCommand for Delete {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        if !request.extras.is_empty() || !request.value.is_empty() {
            return Err(SubdocError::InvalidArguments("DELETE takes only a key"));
        }
        Ok(Delete {
            key: checked_key(request)?,
            cas: request.cas,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Delete {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        let expected = (self.cas != 0).then_some(self.cas);
        let info = ctx.engine.remove(ctx.vbucket, &self.key, expected).await?;
        Ok(Reply::mutated(info))
    }
}

/// Does nothing; clients use it to flush pipelines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Noop;

impl ParseCommand for Noop {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        if !request.extras.is_empty() || !request.key.is_empty() || !request.value.is_empty() {
            return Err(SubdocError::InvalidArguments("NOOP takes no body"));
        }
        Ok(Noop)
    }
}

#[async_trait]
impl ExecutableCommand for Noop {
    async fn execute(&self, _ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        Ok(Reply::success())
    }
}
