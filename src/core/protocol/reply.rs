// src/core/protocol/reply.rs

//! The connection-independent result of a command and its conversion into a
//! response packet for a particular session.

use super::hello::Features;
use super::packet::{Request, Response};
use super::status::Status;
use super::subdoc::encode_mutation_extras;
use crate::core::storage::{DATATYPE_JSON, MutationInfo};
use bytes::Bytes;

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub cas: u64,
    pub datatype: u8,
    pub extras: Bytes,
    pub value: Bytes,
    /// Set for committed mutations.
    pub mutation: Option<MutationInfo>,
}

impl Reply {
    pub fn success() -> Self {
        Self::with_status(Status::Success)
    }

    /// A reply carrying only `status`: no CAS, no extras, empty body.
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            cas: 0,
            datatype: 0,
            extras: Bytes::new(),
            value: Bytes::new(),
            mutation: None,
        }
    }

    /// A successful, committed mutation.
    pub fn mutated(info: MutationInfo) -> Self {
        Self {
            cas: info.cas,
            mutation: Some(info),
            ..Self::success()
        }
    }

    pub fn cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn datatype(mut self, datatype: u8) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn extras(mut self, extras: Bytes) -> Self {
        self.extras = extras;
        self
    }

    pub fn value(mut self, value: Bytes) -> Self {
        self.value = value;
        self
    }

    /// Shapes the reply for a connection with the negotiated `features`.
    /// Mutation tokens only go to clients that asked for them. The JSON
    /// datatype bit needs JSON; every other datatype bit needs DATATYPE.
    pub fn into_response(self, request: &Request, features: Features) -> Response {
        let extras = match self.mutation {
            Some(info) if features.contains(Features::MUTATION_SEQNO) => {
                encode_mutation_extras(&info)
            }
            _ => self.extras,
        };
        let mut visible = 0;
        if features.contains(Features::DATATYPE) {
            visible |= !DATATYPE_JSON;
        }
        if features.contains(Features::JSON) {
            visible |= DATATYPE_JSON;
        }
        let datatype = self.datatype & visible;

        Response {
            opcode: request.opcode,
            status: self.status,
            datatype,
            opaque: request.opaque,
            cas: self.cas,
            extras,
            key: Bytes::new(),
            value: self.value,
        }
    }
}
