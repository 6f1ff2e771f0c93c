// src/core/protocol/opcode.rs

//! Command opcodes understood by the server.

use strum_macros::{Display, FromRepr, IntoStaticStr};

/// Request magic byte.
pub const REQUEST_MAGIC: u8 = 0x80;
/// Response magic byte.
pub const RESPONSE_MAGIC: u8 = 0x81;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Delete = 0x04,
    Noop = 0x0a,
    Hello = 0x1f,

    SubdocGet = 0xc5,
    SubdocExists = 0xc6,
    SubdocDictAdd = 0xc7,
    SubdocDictUpsert = 0xc8,
    SubdocDelete = 0xc9,
    SubdocReplace = 0xca,
    SubdocArrayPushLast = 0xcb,
    SubdocArrayPushFirst = 0xcc,
    SubdocArrayInsert = 0xcd,
    SubdocArrayAddUnique = 0xce,
    SubdocCounter = 0xcf,
    SubdocMultiLookup = 0xd0,
    SubdocMultiMutation = 0xd1,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for the single-path sub-document opcodes (`0xc5..=0xcf`).
    pub fn is_single_path_subdoc(self) -> bool {
        (Opcode::SubdocGet.as_u8()..=Opcode::SubdocCounter.as_u8()).contains(&self.as_u8())
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Opcode::from_repr(value).ok_or(value)
    }
}
