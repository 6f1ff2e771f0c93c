// src/core/storage/vbucket.rs

//! Key to vbucket mapping and the ownership map of a node.

use crc::{CRC_32_ISO_HDLC, Crc};

/// Default number of vbuckets in a bucket.
pub const DEFAULT_NUM_VBUCKETS: u16 = 1024;

/// The CRC32 variant clients hash keys with.
const CRC32_ALGO: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Calculates the vbucket a client routes `key` to.
///
/// The upper half of the CRC32 of the key, masked to 15 bits, modulo the
/// number of vbuckets.
pub fn vbucket_for_key(key: &[u8], num_vbuckets: u16) -> u16 {
    let hash = (CRC32_ALGO.checksum(key) >> 16) & 0x7fff;
    (hash % u32::from(num_vbuckets.max(1))) as u16
}

/// Which vbuckets this node is active for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbucketMap {
    owned: Vec<bool>,
}

impl VbucketMap {
    /// A map owning every one of `num_vbuckets`.
    pub fn all(num_vbuckets: u16) -> Self {
        Self {
            owned: vec![true; usize::from(num_vbuckets)],
        }
    }

    /// A map owning only the listed vbuckets; ids outside the range are ignored.
    pub fn with_owned(num_vbuckets: u16, owned: &[u16]) -> Self {
        let mut map = vec![false; usize::from(num_vbuckets)];
        for &vb in owned {
            if let Some(slot) = map.get_mut(usize::from(vb)) {
                *slot = true;
            }
        }
        Self { owned: map }
    }

    pub fn num_vbuckets(&self) -> u16 {
        self.owned.len() as u16
    }

    pub fn is_owned(&self, vbucket: u16) -> bool {
        self.owned.get(usize::from(vbucket)).copied().unwrap_or(false)
    }
}
