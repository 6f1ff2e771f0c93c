// src/core/errors.rs

//! Defines the primary error types of the server: the failures a sub-document
//! command can end in, and the narrower set the storage interface reports.

use crate::core::protocol::Status;
use std::sync::Arc;
use thiserror::Error;

/// Every failure a request can end in. Each variant maps onto exactly one
/// wire [`Status`] through [`SubdocError::status`].
#[derive(Error, Debug, Clone)]
pub enum SubdocError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The byte stream cannot be framed any further; the connection is closed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown command opcode 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(&'static str),

    #[error("Value too large")]
    ValueTooLarge,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Key exists or CAS mismatch")]
    KeyExists,

    #[error("Vbucket is not owned by this node")]
    NotMyVbucket,

    #[error("Temporary failure, retry later")]
    TemporaryFailure,

    #[error("Path not found")]
    PathNotFound,

    #[error("Path mismatch")]
    PathMismatch,

    #[error("Invalid path: {0}")]
    PathInvalid(&'static str),

    #[error("Path too deep")]
    PathTooBig,

    #[error("Value cannot be inserted")]
    ValueCantInsert,

    #[error("Document is not JSON")]
    DocNotJson,

    #[error("Number out of range")]
    NumberOutOfRange,

    #[error("Invalid counter delta")]
    DeltaInvalid,

    #[error("Path already exists")]
    PathExists,

    #[error("Value would make the document too deep")]
    ValueTooDeep,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubdocError {
    /// Returns the wire status reported to the client for this error.
    pub fn status(&self) -> Status {
        match self {
            SubdocError::Io(_) | SubdocError::Protocol(_) | SubdocError::Internal(_) => {
                Status::EInternal
            }
            SubdocError::UnknownCommand(_) => Status::UnknownCommand,
            SubdocError::InvalidArguments(_) => Status::Einval,
            SubdocError::ValueTooLarge => Status::E2big,
            SubdocError::KeyNotFound => Status::KeyENoent,
            SubdocError::KeyExists => Status::KeyEexists,
            SubdocError::NotMyVbucket => Status::NotMyVbucket,
            SubdocError::TemporaryFailure => Status::ETmpFail,
            SubdocError::PathNotFound => Status::SubdocPathENoent,
            SubdocError::PathMismatch => Status::SubdocPathMismatch,
            SubdocError::PathInvalid(_) => Status::SubdocPathEinval,
            SubdocError::PathTooBig => Status::SubdocPathE2big,
            SubdocError::ValueCantInsert => Status::SubdocValueCantInsert,
            SubdocError::DocNotJson => Status::SubdocDocNotJson,
            SubdocError::NumberOutOfRange => Status::SubdocNumErange,
            SubdocError::DeltaInvalid => Status::SubdocDeltaEinval,
            SubdocError::PathExists => Status::SubdocPathEexists,
            SubdocError::ValueTooDeep => Status::SubdocValueEtoodeep,
        }
    }
}

// Compared by variant; the message payloads are diagnostic only.
impl PartialEq for SubdocError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SubdocError::Io(e1), SubdocError::Io(e2)) => e1.kind() == e2.kind(),
            (SubdocError::UnknownCommand(a), SubdocError::UnknownCommand(b)) => a == b,
            (SubdocError::Internal(a), SubdocError::Internal(b)) => a == b,
            (SubdocError::Protocol(a), SubdocError::Protocol(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for SubdocError {
    fn from(e: std::io::Error) -> Self {
        SubdocError::Io(Arc::new(e))
    }
}

/// Failures reported by a [`StorageEngine`](crate::core::storage::StorageEngine).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("document not found")]
    NotFound,

    #[error("CAS mismatch")]
    CasMismatch,

    #[error("vbucket not owned")]
    NotMyVbucket,
}

impl From<StorageError> for SubdocError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => SubdocError::KeyNotFound,
            StorageError::CasMismatch => SubdocError::KeyExists,
            StorageError::NotMyVbucket => SubdocError::NotMyVbucket,
        }
    }
}
