// src/core/protocol/subdoc.rs

//! Body layouts of the sub-document commands.
//!
//! Everything here works on raw bytes: paths are not parsed and opcodes are
//! not interpreted. Turning these frames into typed commands is the job of
//! the command layer.

use super::opcode::Opcode;
use super::packet::Request;
use super::status::Status;
use crate::core::SubdocError;
use crate::core::storage::MutationInfo;
use crate::core::subdoc::SUBDOC_PATH_MAX_LENGTH;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest key accepted by the protocol.
pub const KEY_MAX_LENGTH: usize = 250;

/// Maximum number of specs in one multi-path command.
pub const SUBDOC_MULTI_MAX_PATHS: usize = 16;

const SINGLE_PATH_EXTRAS_LEN: usize = 3;
const SINGLE_PATH_EXTRAS_WITH_EXPIRY_LEN: usize = 7;
const LOOKUP_SPEC_HEADER_LEN: usize = 4;
const MUTATION_SPEC_HEADER_LEN: usize = 8;
const MUTATION_EXTRAS_LEN: usize = 16;

fn check_key(key: &[u8]) -> Result<(), SubdocError> {
    if key.is_empty() {
        return Err(SubdocError::InvalidArguments("key must not be empty"));
    }
    if key.len() > KEY_MAX_LENGTH {
        return Err(SubdocError::InvalidArguments("key too long"));
    }
    Ok(())
}

fn check_path_len(len: usize) -> Result<(), SubdocError> {
    if len > SUBDOC_PATH_MAX_LENGTH {
        Err(SubdocError::InvalidArguments("path too long"))
    } else {
        Ok(())
    }
}

/// A single-path request: extras `{path_len: u16, flags: u8, [expiry: u32]}`,
/// body `key | path | value`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SinglePathFrame {
    pub key: Bytes,
    pub path: Bytes,
    pub value: Bytes,
    pub flags: u8,
    pub expiry: Option<u32>,
}

impl SinglePathFrame {
    pub fn decode(request: &Request) -> Result<Self, SubdocError> {
        check_key(&request.key)?;

        let mut extras = request.extras.clone();
        let has_expiry = match extras.len() {
            SINGLE_PATH_EXTRAS_LEN => false,
            SINGLE_PATH_EXTRAS_WITH_EXPIRY_LEN => true,
            _ => {
                return Err(SubdocError::InvalidArguments(
                    "single-path extras must be 3 or 7 bytes",
                ));
            }
        };
        let path_len = usize::from(extras.get_u16());
        let flags = extras.get_u8();
        let expiry = has_expiry.then(|| extras.get_u32());

        if path_len > request.value.len() {
            return Err(SubdocError::InvalidArguments("path length exceeds the body"));
        }
        check_path_len(path_len)?;

        Ok(Self {
            key: request.key.clone(),
            path: request.value.slice(..path_len),
            value: request.value.slice(path_len..),
            flags,
            expiry,
        })
    }

    pub fn into_request(self, opcode: Opcode) -> Request {
        let mut extras = BytesMut::with_capacity(SINGLE_PATH_EXTRAS_WITH_EXPIRY_LEN);
        extras.put_u16(self.path.len() as u16);
        extras.put_u8(self.flags);
        if let Some(expiry) = self.expiry {
            extras.put_u32(expiry);
        }

        let mut body = BytesMut::with_capacity(self.path.len() + self.value.len());
        body.extend_from_slice(&self.path);
        body.extend_from_slice(&self.value);

        Request::new(opcode)
            .with_key(self.key)
            .with_extras(extras.freeze())
            .with_value(body.freeze())
    }
}

/// One spec of a multi-path command. Lookup specs never carry a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathSpec {
    pub opcode: u8,
    pub flags: u8,
    pub path: Bytes,
    pub value: Bytes,
}

/// A multi-path request.
///
/// Lookup specs are `{opcode: u8, flags: u8, path_len: u16, path}`; mutation
/// specs are `{opcode: u8, flags: u8, path_len: u16, value_len: u32, path,
/// value}`. Mutations may carry a 4-byte expiry in the extras.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiPathFrame {
    pub key: Bytes,
    pub specs: Vec<PathSpec>,
    pub expiry: Option<u32>,
}

impl MultiPathFrame {
    pub fn decode_lookup(request: &Request) -> Result<Self, SubdocError> {
        check_key(&request.key)?;
        if !request.extras.is_empty() {
            return Err(SubdocError::InvalidArguments("multi-lookup takes no extras"));
        }
        Ok(Self {
            key: request.key.clone(),
            specs: decode_specs(&request.value, false)?,
            expiry: None,
        })
    }

    pub fn decode_mutation(request: &Request) -> Result<Self, SubdocError> {
        check_key(&request.key)?;
        let mut extras = request.extras.clone();
        let expiry = match extras.len() {
            0 => None,
            4 => Some(extras.get_u32()),
            _ => {
                return Err(SubdocError::InvalidArguments(
                    "multi-mutation extras must be 0 or 4 bytes",
                ));
            }
        };
        Ok(Self {
            key: request.key.clone(),
            specs: decode_specs(&request.value, true)?,
            expiry,
        })
    }

    pub fn into_lookup_request(self) -> Request {
        let mut body = BytesMut::new();
        for spec in &self.specs {
            body.put_u8(spec.opcode);
            body.put_u8(spec.flags);
            body.put_u16(spec.path.len() as u16);
            body.extend_from_slice(&spec.path);
        }
        Request::new(Opcode::SubdocMultiLookup)
            .with_key(self.key)
            .with_value(body.freeze())
    }

    pub fn into_mutation_request(self) -> Request {
        let mut body = BytesMut::new();
        for spec in &self.specs {
            body.put_u8(spec.opcode);
            body.put_u8(spec.flags);
            body.put_u16(spec.path.len() as u16);
            body.put_u32(spec.value.len() as u32);
            body.extend_from_slice(&spec.path);
            body.extend_from_slice(&spec.value);
        }
        let extras = match self.expiry {
            Some(expiry) => Bytes::copy_from_slice(&expiry.to_be_bytes()),
            None => Bytes::new(),
        };
        Request::new(Opcode::SubdocMultiMutation)
            .with_key(self.key)
            .with_extras(extras)
            .with_value(body.freeze())
    }
}

fn decode_specs(body: &Bytes, with_value: bool) -> Result<Vec<PathSpec>, SubdocError> {
    let header_len = if with_value {
        MUTATION_SPEC_HEADER_LEN
    } else {
        LOOKUP_SPEC_HEADER_LEN
    };
    let mut cursor = body.clone();
    let mut specs = Vec::new();

    while cursor.has_remaining() {
        if specs.len() == SUBDOC_MULTI_MAX_PATHS {
            return Err(SubdocError::InvalidArguments("too many specs"));
        }
        if cursor.remaining() < header_len {
            return Err(SubdocError::InvalidArguments("truncated spec header"));
        }
        let opcode = cursor.get_u8();
        let flags = cursor.get_u8();
        let path_len = usize::from(cursor.get_u16());
        let value_len = if with_value {
            cursor.get_u32() as usize
        } else {
            0
        };
        if cursor.remaining() < path_len + value_len {
            return Err(SubdocError::InvalidArguments("truncated spec body"));
        }
        check_path_len(path_len)?;
        let path = cursor.split_to(path_len);
        let value = cursor.split_to(value_len);
        specs.push(PathSpec {
            opcode,
            flags,
            path,
            value,
        });
    }

    if specs.is_empty() {
        return Err(SubdocError::InvalidArguments("at least one spec is required"));
    }
    Ok(specs)
}

fn decode_status(raw: u16) -> Result<Status, SubdocError> {
    Status::try_from(raw).map_err(|raw| SubdocError::Protocol(format!("unknown status 0x{raw:04x}")))
}

fn truncated() -> SubdocError {
    SubdocError::Protocol("truncated multi-path response".to_string())
}

/// Outcome of one lookup spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub status: Status,
    pub value: Bytes,
}

/// Encodes lookup results as `{status: u16, len: u32, value}` per spec.
pub fn encode_lookup_results(results: &[LookupResult]) -> Bytes {
    let mut body = BytesMut::new();
    for result in results {
        body.put_u16(result.status.as_u16());
        body.put_u32(result.value.len() as u32);
        body.extend_from_slice(&result.value);
    }
    body.freeze()
}

pub fn decode_lookup_results(body: &Bytes) -> Result<Vec<LookupResult>, SubdocError> {
    let mut cursor = body.clone();
    let mut results = Vec::new();
    while cursor.has_remaining() {
        if cursor.remaining() < 6 {
            return Err(truncated());
        }
        let status = decode_status(cursor.get_u16())?;
        let len = cursor.get_u32() as usize;
        if cursor.remaining() < len {
            return Err(truncated());
        }
        results.push(LookupResult {
            status,
            value: cursor.split_to(len),
        });
    }
    Ok(results)
}

/// Output of one mutation spec that produced a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub index: u8,
    pub status: Status,
    pub value: Bytes,
}

/// Encodes mutation outputs as `{index: u8, status: u16, len: u32, value}`.
pub fn encode_mutation_results(results: &[MutationResult]) -> Bytes {
    let mut body = BytesMut::new();
    for result in results {
        body.put_u8(result.index);
        body.put_u16(result.status.as_u16());
        body.put_u32(result.value.len() as u32);
        body.extend_from_slice(&result.value);
    }
    body.freeze()
}

pub fn decode_mutation_results(body: &Bytes) -> Result<Vec<MutationResult>, SubdocError> {
    let mut cursor = body.clone();
    let mut results = Vec::new();
    while cursor.has_remaining() {
        if cursor.remaining() < 7 {
            return Err(truncated());
        }
        let index = cursor.get_u8();
        let status = decode_status(cursor.get_u16())?;
        let len = cursor.get_u32() as usize;
        if cursor.remaining() < len {
            return Err(truncated());
        }
        results.push(MutationResult {
            index,
            status,
            value: cursor.split_to(len),
        });
    }
    Ok(results)
}

/// Body of a failed multi-mutation: the index and status of the first
/// failing spec.
pub fn encode_multi_failure(index: u8, status: Status) -> Bytes {
    let mut body = BytesMut::with_capacity(3);
    body.put_u8(index);
    body.put_u16(status.as_u16());
    body.freeze()
}

pub fn decode_multi_failure(body: &[u8]) -> Result<(u8, Status), SubdocError> {
    let mut cursor = body;
    if cursor.len() != 3 {
        return Err(truncated());
    }
    let index = cursor.get_u8();
    let status = decode_status(cursor.get_u16())?;
    Ok((index, status))
}

/// A mutation's position in its vbucket's history, as sent to clients that
/// negotiated mutation sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationToken {
    pub vbucket_uuid: u64,
    pub seqno: u64,
}

pub fn encode_mutation_extras(info: &MutationInfo) -> Bytes {
    let mut extras = BytesMut::with_capacity(MUTATION_EXTRAS_LEN);
    extras.put_u64(info.vbucket_uuid);
    extras.put_u64(info.seqno);
    extras.freeze()
}

pub fn decode_mutation_extras(extras: &[u8]) -> Option<MutationToken> {
    if extras.len() != MUTATION_EXTRAS_LEN {
        return None;
    }
    let mut cursor = extras;
    Some(MutationToken {
        vbucket_uuid: cursor.get_u64(),
        seqno: cursor.get_u64(),
    })
}
