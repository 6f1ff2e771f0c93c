// src/core/protocol/mod.rs

//! The memcached-style binary protocol: packet framing, opcodes, statuses and
//! the sub-document body layouts.

pub mod header;
pub mod hello;
pub mod opcode;
pub mod packet;
pub mod reply;
pub mod status;
pub mod subdoc;

pub use header::{HEADER_LEN, Header};
pub use hello::Features;
pub use opcode::Opcode;
pub use packet::{ClientCodec, Request, Response, ServerCodec};
pub use reply::Reply;
pub use status::Status;
