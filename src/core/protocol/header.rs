// src/core/protocol/header.rs

//! The fixed 24-byte packet header.

use bytes::{Buf, BufMut, BytesMut};

/// Size of every packet header in bytes.
pub const HEADER_LEN: usize = 24;

/// A decoded header. `vbucket_or_status` is the vbucket id in requests and the
/// status code in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub datatype: u8,
    pub vbucket_or_status: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl Header {
    /// Reads a header from the first [`HEADER_LEN`] bytes of `buf`.
    /// The caller guarantees the length.
    pub fn parse(mut buf: &[u8]) -> Self {
        Self {
            magic: buf.get_u8(),
            opcode: buf.get_u8(),
            key_len: buf.get_u16(),
            extras_len: buf.get_u8(),
            datatype: buf.get_u8(),
            vbucket_or_status: buf.get_u16(),
            body_len: buf.get_u32(),
            opaque: buf.get_u32(),
            cas: buf.get_u64(),
        }
    }

    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_LEN);
        dst.put_u8(self.magic);
        dst.put_u8(self.opcode);
        dst.put_u16(self.key_len);
        dst.put_u8(self.extras_len);
        dst.put_u8(self.datatype);
        dst.put_u16(self.vbucket_or_status);
        dst.put_u32(self.body_len);
        dst.put_u32(self.opaque);
        dst.put_u64(self.cas);
    }
}
