// src/core/protocol/status.rs

//! Response status codes of the binary protocol, including the sub-document range.

use strum_macros::{Display, FromRepr, IntoStaticStr};

/// The 16-bit status carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum Status {
    Success = 0x00,
    KeyENoent = 0x01,
    KeyEexists = 0x02,
    E2big = 0x03,
    Einval = 0x04,
    NotStored = 0x05,
    NotMyVbucket = 0x07,
    UnknownCommand = 0x81,
    ENoMem = 0x82,
    NotSupported = 0x83,
    EInternal = 0x84,
    ETmpFail = 0x86,

    /// The path does not exist in the document.
    SubdocPathENoent = 0xc0,
    /// One of the path components treats a value as the wrong container type.
    SubdocPathMismatch = 0xc1,
    /// The path is syntactically invalid.
    SubdocPathEinval = 0xc2,
    /// The path reaches below the maximum supported depth.
    SubdocPathE2big = 0xc3,
    /// The existing document is already deeper than supported.
    SubdocDocE2deep = 0xc4,
    /// The supplied value cannot be inserted at the path.
    SubdocValueCantInsert = 0xc5,
    /// The stored document is not a JSON container.
    SubdocDocNotJson = 0xc6,
    /// The existing number is outside the supported counter range.
    SubdocNumErange = 0xc7,
    /// The counter delta is not a valid non-zero integer.
    SubdocDeltaEinval = 0xc8,
    /// The path already exists.
    SubdocPathEexists = 0xc9,
    /// Inserting the value would make the document too deep.
    SubdocValueEtoodeep = 0xca,
    /// An invalid combination of operations was given in a multi-path command.
    SubdocInvalidCombo = 0xcb,
    /// At least one spec of a multi-path command failed.
    SubdocMultiPathFailure = 0xcc,
}

impl Status {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl TryFrom<u16> for Status {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Status::from_repr(value).ok_or(value)
    }
}
