// src/core/storage/memory.rs

//! An in-memory [`StorageEngine`] backed by a sharded concurrent map.

use super::expiry::{is_expired, unix_now};
use super::vbucket::VbucketMap;
use super::{Document, MutationInfo, StorageEngine, StoreRequest};
use crate::core::errors::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Per-vbucket bookkeeping reported back with every mutation.
#[derive(Debug)]
struct VbucketState {
    uuid: u64,
    high_seqno: AtomicU64,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    value: Bytes,
    datatype: u8,
    cas: u64,
    flags: u32,
    expiry: Option<u64>,
}

impl StoredDocument {
    fn to_document(&self) -> Document {
        Document {
            value: self.value.clone(),
            datatype: self.datatype,
            cas: self.cas,
            flags: self.flags,
            expiry: self.expiry,
        }
    }
}

/// Documents keyed by `(vbucket, key)`. CAS values come from one engine-wide
/// counter, so they are unique and strictly increasing.
#[derive(Debug)]
pub struct MemoryEngine {
    documents: DashMap<(u16, Bytes), StoredDocument>,
    vbuckets: Vec<VbucketState>,
    ownership: VbucketMap,
    last_cas: AtomicU64,
}

impl MemoryEngine {
    /// Creates an engine active for all of `num_vbuckets`.
    pub fn new(num_vbuckets: u16) -> Self {
        Self::with_vbucket_map(VbucketMap::all(num_vbuckets))
    }

    /// Creates an engine active only for the vbuckets `ownership` marks.
    pub fn with_vbucket_map(ownership: VbucketMap) -> Self {
        let vbuckets = (0..ownership.num_vbuckets())
            .map(|_| VbucketState {
                uuid: rand::random::<u64>(),
                high_seqno: AtomicU64::new(0),
            })
            .collect();
        Self {
            documents: DashMap::new(),
            vbuckets,
            ownership,
            last_cas: AtomicU64::new(0),
        }
    }

    /// Number of live entries, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn active_vbucket(&self, vbucket: u16) -> Result<&VbucketState, StorageError> {
        if !self.ownership.is_owned(vbucket) {
            return Err(StorageError::NotMyVbucket);
        }
        self.vbuckets
            .get(usize::from(vbucket))
            .ok_or(StorageError::NotMyVbucket)
    }

    fn next_cas(&self) -> u64 {
        self.last_cas.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_mutation(state: &VbucketState, cas: u64) -> MutationInfo {
        MutationInfo {
            cas,
            seqno: state.high_seqno.fetch_add(1, Ordering::Relaxed) + 1,
            vbucket_uuid: state.uuid,
        }
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn load(&self, vbucket: u16, key: &[u8]) -> Result<Document, StorageError> {
        self.active_vbucket(vbucket)?;
        let map_key = (vbucket, Bytes::copy_from_slice(key));
        let now = unix_now();

        let found = match self.documents.get(&map_key) {
            Some(entry) if !is_expired(entry.expiry, now) => return Ok(entry.to_document()),
            Some(_) => true,
            None => false,
        };
        if found
            && self
                .documents
                .remove_if(&map_key, |_, doc| is_expired(doc.expiry, now))
                .is_some()
        {
            debug!("Reaped expired document in vbucket {}", vbucket);
        }
        Err(StorageError::NotFound)
    }

    async fn store(
        &self,
        vbucket: u16,
        key: &[u8],
        request: StoreRequest,
    ) -> Result<MutationInfo, StorageError> {
        let state = self.active_vbucket(vbucket)?;
        let now = unix_now();

        let cas = match self.documents.entry((vbucket, Bytes::copy_from_slice(key))) {
            Entry::Occupied(mut occupied) => {
                if let Some(expected) = request.expected_cas {
                    if is_expired(occupied.get().expiry, now) {
                        occupied.remove();
                        return Err(StorageError::NotFound);
                    }
                    if occupied.get().cas != expected {
                        return Err(StorageError::CasMismatch);
                    }
                }
                let cas = self.next_cas();
                occupied.insert(StoredDocument {
                    value: request.value,
                    datatype: request.datatype,
                    cas,
                    flags: request.flags,
                    expiry: request.expiry,
                });
                cas
            }
            Entry::Vacant(vacant) => {
                if request.expected_cas.is_some() {
                    return Err(StorageError::NotFound);
                }
                let cas = self.next_cas();
                vacant.insert(StoredDocument {
                    value: request.value,
                    datatype: request.datatype,
                    cas,
                    flags: request.flags,
                    expiry: request.expiry,
                });
                cas
            }
        };

        Ok(Self::record_mutation(state, cas))
    }

    async fn remove(
        &self,
        vbucket: u16,
        key: &[u8],
        expected_cas: Option<u64>,
    ) -> Result<MutationInfo, StorageError> {
        let state = self.active_vbucket(vbucket)?;
        let now = unix_now();

        match self.documents.entry((vbucket, Bytes::copy_from_slice(key))) {
            Entry::Occupied(occupied) => {
                if is_expired(occupied.get().expiry, now) {
                    occupied.remove();
                    return Err(StorageError::NotFound);
                }
                if expected_cas.is_some_and(|cas| cas != occupied.get().cas) {
                    return Err(StorageError::CasMismatch);
                }
                occupied.remove();
            }
            Entry::Vacant(_) => return Err(StorageError::NotFound),
        }

        Ok(Self::record_mutation(state, self.next_cas()))
    }
}
