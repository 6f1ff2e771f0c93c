// src/core/storage/expiry.rs

//! Conversion between protocol expiry values and absolute times.

use std::time::{SystemTime, UNIX_EPOCH};

/// Expiry values up to this many seconds (30 days) are relative to now;
/// larger values are absolute UNIX timestamps.
pub const RELATIVE_EXPIRY_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Current time in UNIX seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Converts a wire expiry into an absolute UNIX time. `0` means no expiry.
pub fn to_absolute(expiry: u32, now: u64) -> Option<u64> {
    match expiry {
        0 => None,
        relative if relative <= RELATIVE_EXPIRY_LIMIT => Some(now + u64::from(relative)),
        absolute => Some(u64::from(absolute)),
    }
}

/// True once `expiry` has been reached.
pub fn is_expired(expiry: Option<u64>, now: u64) -> bool {
    expiry.is_some_and(|at| at <= now)
}
