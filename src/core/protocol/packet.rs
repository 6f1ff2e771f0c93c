// src/core/protocol/packet.rs

//! Request and response packets and the `tokio_util` codecs that frame them.
//!
//! [`ServerCodec`] reads requests and writes responses; [`ClientCodec`] is its
//! mirror image for tools and tests talking to a server.

use super::header::{HEADER_LEN, Header};
use super::opcode::{Opcode, REQUEST_MAGIC, RESPONSE_MAGIC};
use super::status::Status;
use crate::core::SubdocError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default upper bound on the body of a single packet (20 MiB plus slack for
/// key and extras).
pub const DEFAULT_MAX_BODY_LEN: usize = 20 * 1024 * 1024 + 1024;

/// A request packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub opcode: u8,
    pub datatype: u8,
    pub vbucket: u16,
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Request {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode: opcode.as_u8(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn with_vbucket(mut self, vbucket: u16) -> Self {
        self.vbucket = vbucket;
        self
    }

    pub fn with_opaque(mut self, opaque: u32) -> Self {
        self.opaque = opaque;
        self
    }

    pub fn with_datatype(mut self, datatype: u8) -> Self {
        self.datatype = datatype;
        self
    }
}

/// A response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub opcode: u8,
    pub status: Status,
    pub datatype: u8,
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

/// The pieces of a framed packet before they are given a direction.
struct RawPacket {
    header: Header,
    extras: Bytes,
    key: Bytes,
    value: Bytes,
}

/// Splits one complete packet off `src`, or returns `None` if more bytes are
/// needed. Malformed headers are fatal for the stream.
fn decode_packet(
    src: &mut BytesMut,
    magic: u8,
    max_body_len: usize,
) -> Result<Option<RawPacket>, SubdocError> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let header = Header::parse(&src[..HEADER_LEN]);
    if header.magic != magic {
        return Err(SubdocError::Protocol(format!(
            "invalid magic byte 0x{:02x}",
            header.magic
        )));
    }

    let body_len = header.body_len as usize;
    if body_len > max_body_len {
        return Err(SubdocError::Protocol(format!(
            "packet body of {body_len} bytes exceeds the limit of {max_body_len}"
        )));
    }
    let extras_len = usize::from(header.extras_len);
    let key_len = usize::from(header.key_len);
    if extras_len + key_len > body_len {
        return Err(SubdocError::Protocol(
            "extras and key lengths exceed the body length".to_string(),
        ));
    }

    let total_len = HEADER_LEN + body_len;
    if src.len() < total_len {
        src.reserve(total_len - src.len());
        return Ok(None);
    }

    let mut body = src.split_to(total_len).freeze();
    body.advance(HEADER_LEN);
    let extras = body.split_to(extras_len);
    let key = body.split_to(key_len);

    Ok(Some(RawPacket {
        header,
        extras,
        key,
        value: body,
    }))
}

#[allow(clippy::too_many_arguments)]
fn encode_packet(
    dst: &mut BytesMut,
    magic: u8,
    opcode: u8,
    datatype: u8,
    vbucket_or_status: u16,
    opaque: u32,
    cas: u64,
    extras: &[u8],
    key: &[u8],
    value: &[u8],
) -> Result<(), SubdocError> {
    let extras_len =
        u8::try_from(extras.len()).map_err(|_| SubdocError::Protocol("extras too long".into()))?;
    let key_len =
        u16::try_from(key.len()).map_err(|_| SubdocError::Protocol("key too long".into()))?;
    let body_len = u32::try_from(extras.len() + key.len() + value.len())
        .map_err(|_| SubdocError::Protocol("body too long".into()))?;

    Header {
        magic,
        opcode,
        key_len,
        extras_len,
        datatype,
        vbucket_or_status,
        body_len,
        opaque,
        cas,
    }
    .write(dst);
    dst.reserve(body_len as usize);
    dst.extend_from_slice(extras);
    dst.extend_from_slice(key);
    dst.extend_from_slice(value);
    Ok(())
}

/// Server side codec: decodes [`Request`]s, encodes [`Response`]s.
#[derive(Debug, Clone)]
pub struct ServerCodec {
    max_body_len: usize,
}

impl ServerCodec {
    pub fn new(max_body_len: usize) -> Self {
        Self { max_body_len }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LEN)
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = SubdocError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(packet) = decode_packet(src, REQUEST_MAGIC, self.max_body_len)? else {
            return Ok(None);
        };
        Ok(Some(Request {
            opcode: packet.header.opcode,
            datatype: packet.header.datatype,
            vbucket: packet.header.vbucket_or_status,
            opaque: packet.header.opaque,
            cas: packet.header.cas,
            extras: packet.extras,
            key: packet.key,
            value: packet.value,
        }))
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = SubdocError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_packet(
            dst,
            RESPONSE_MAGIC,
            item.opcode,
            item.datatype,
            item.status.as_u16(),
            item.opaque,
            item.cas,
            &item.extras,
            &item.key,
            &item.value,
        )
    }
}

/// Client side codec: encodes [`Request`]s, decodes [`Response`]s.
#[derive(Debug, Clone)]
pub struct ClientCodec {
    max_body_len: usize,
}

impl ClientCodec {
    pub fn new(max_body_len: usize) -> Self {
        Self { max_body_len }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LEN)
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = SubdocError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_packet(
            dst,
            REQUEST_MAGIC,
            item.opcode,
            item.datatype,
            item.vbucket,
            item.opaque,
            item.cas,
            &item.extras,
            &item.key,
            &item.value,
        )
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = SubdocError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(packet) = decode_packet(src, RESPONSE_MAGIC, self.max_body_len)? else {
            return Ok(None);
        };
        let status = Status::try_from(packet.header.vbucket_or_status)
            .map_err(|raw| SubdocError::Protocol(format!("unknown status 0x{raw:04x}")))?;
        Ok(Some(Response {
            opcode: packet.header.opcode,
            status,
            datatype: packet.header.datatype,
            opaque: packet.header.opaque,
            cas: packet.header.cas,
            extras: packet.extras,
            key: packet.key,
            value: packet.value,
        }))
    }
}
