// src/core/protocol/hello.rs

//! Feature codes negotiated with `HELLO`.

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Wire codes of the features this server understands.
pub const FEATURE_DATATYPE: u16 = 0x01;
pub const FEATURE_MUTATION_SEQNO: u16 = 0x04;
pub const FEATURE_JSON: u16 = 0x0b;

bitflags! {
    /// Capabilities enabled on one connection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u8 {
        /// Responses carry the datatype of stored values.
        const DATATYPE       = 1 << 0;
        /// Mutation responses carry `{vbucket_uuid, seqno}` extras.
        const MUTATION_SEQNO = 1 << 1;
        /// The client understands the JSON datatype bit.
        const JSON           = 1 << 2;
    }
}

impl Features {
    /// Maps a wire feature code; unknown codes are ignored by the server.
    pub fn from_code(code: u16) -> Option<Features> {
        match code {
            FEATURE_DATATYPE => Some(Features::DATATYPE),
            FEATURE_MUTATION_SEQNO => Some(Features::MUTATION_SEQNO),
            FEATURE_JSON => Some(Features::JSON),
            _ => None,
        }
    }

    /// Wire codes of the enabled features, in code order.
    pub fn codes(self) -> Vec<u16> {
        [FEATURE_DATATYPE, FEATURE_MUTATION_SEQNO, FEATURE_JSON]
            .into_iter()
            .filter(|code| Features::from_code(*code).is_some_and(|f| self.contains(f)))
            .collect()
    }
}

/// Encodes a list of feature codes as a `HELLO` body.
pub fn encode_feature_codes(codes: &[u16]) -> Bytes {
    let mut body = BytesMut::with_capacity(codes.len() * 2);
    for code in codes {
        body.put_u16(*code);
    }
    body.freeze()
}

/// Decodes a `HELLO` body. Callers reject bodies of odd length first.
pub fn decode_feature_codes(body: &[u8]) -> Vec<u16> {
    body.chunks_exact(2)
        .map(|mut pair| pair.get_u16())
        .collect()
}
