// src/core/storage/mod.rs

//! The storage interface the command processors are written against, plus an
//! in-memory engine implementing it.

pub mod expiry;
pub mod memory;
pub mod vbucket;

use crate::core::errors::StorageError;
use async_trait::async_trait;
use bytes::Bytes;

pub use memory::MemoryEngine;

/// JSON datatype bit of the binary protocol.
pub const DATATYPE_JSON: u8 = 0x01;

/// Largest document the server stores (20 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 20 * 1024 * 1024;

/// A stored document as seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub value: Bytes,
    pub datatype: u8,
    pub cas: u64,
    pub flags: u32,
    /// Absolute expiry in UNIX seconds.
    pub expiry: Option<u64>,
}

impl Document {
    pub fn is_json(&self) -> bool {
        self.datatype & DATATYPE_JSON != 0
    }
}

/// A conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub value: Bytes,
    pub datatype: u8,
    /// When set, the write only succeeds if the current CAS equals this value
    /// and the document exists.
    pub expected_cas: Option<u64>,
    pub flags: u32,
    /// Absolute expiry in UNIX seconds.
    pub expiry: Option<u64>,
}

/// What a successful write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationInfo {
    pub cas: u64,
    pub seqno: u64,
    pub vbucket_uuid: u64,
}

/// The key-value store the server sits on.
///
/// Implementations serialize concurrent writers of one document only through
/// the CAS comparison in [`StorageEngine::store`].
#[async_trait]
pub trait StorageEngine: Send + Sync + std::fmt::Debug {
    /// Loads the current version of a document.
    async fn load(&self, vbucket: u16, key: &[u8]) -> Result<Document, StorageError>;

    /// Stores a document, optionally conditional on its current CAS.
    async fn store(
        &self,
        vbucket: u16,
        key: &[u8],
        request: StoreRequest,
    ) -> Result<MutationInfo, StorageError>;

    /// Removes a document, optionally conditional on its current CAS.
    async fn remove(
        &self,
        vbucket: u16,
        key: &[u8],
        expected_cas: Option<u64>,
    ) -> Result<MutationInfo, StorageError>;
}
