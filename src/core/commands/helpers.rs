// src/core/commands/helpers.rs

//! Shared pieces of the sub-document processors: wire path handling, loading
//! a stored document as a tree, and the optimistic read-modify-write loop.

use crate::core::errors::StorageError;
use crate::core::storage::expiry::{to_absolute, unix_now};
use crate::core::storage::{
    DATATYPE_JSON, Document, MAX_DOCUMENT_SIZE, MutationInfo, StorageEngine, StoreRequest,
};
use crate::core::subdoc::{Path, Value};
use crate::core::SubdocError;
use tracing::{debug, warn};

/// Store attempts made by a mutation without an explicit CAS before it gives
/// up with a temporary failure.
pub const MAXIMUM_ATTEMPTS: usize = 100;

/// A path as received on the wire.
///
/// Encoding problems and the component limit are request errors raised while
/// decoding; syntax errors are kept and only reported when the path is
/// evaluated, after the document has been loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePath {
    parsed: Result<Path, SubdocError>,
    is_root: bool,
}

impl WirePath {
    pub fn decode(raw: &[u8]) -> Result<Self, SubdocError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| SubdocError::InvalidArguments("path is not valid UTF-8"))?;
        let parsed = match Path::parse(text) {
            Err(e @ SubdocError::InvalidArguments(_)) => return Err(e),
            other => other,
        };
        Ok(Self {
            parsed,
            is_root: raw.is_empty(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// The parsed path, or the syntax error it carried.
    pub fn get(&self) -> Result<&Path, SubdocError> {
        self.parsed.as_ref().map_err(Clone::clone)
    }
}

impl From<Path> for WirePath {
    fn from(path: Path) -> Self {
        Self {
            is_root: path.is_root(),
            parsed: Ok(path),
        }
    }
}

/// Parses a stored document into a tree. Documents not flagged as JSON, or
/// that are not a JSON object or array, are `DocNotJson`.
pub fn parse_stored(document: &Document) -> Result<Value, SubdocError> {
    if !document.is_json() {
        return Err(SubdocError::DocNotJson);
    }
    Value::parse_document(&document.value)
}

/// A committed read-modify-write.
#[derive(Debug)]
pub struct Committed<T> {
    pub info: MutationInfo,
    pub output: T,
}

/// Loads `key`, applies `apply` to a fresh tree and stores the result guarded
/// by the CAS that was read.
///
/// With an explicit `cas` (non-zero) the document must still carry it, and a
/// conflicting store fails with `KeyExists`. Without one, a conflicting store
/// restarts the whole cycle, up to [`MAXIMUM_ATTEMPTS`] times. Flags are kept;
/// the expiry is kept unless `expiry` supplies a new one.
pub async fn read_modify_write<T, E, F>(
    engine: &dyn StorageEngine,
    vbucket: u16,
    key: &[u8],
    cas: u64,
    expiry: Option<u32>,
    mut apply: F,
) -> Result<Committed<T>, E>
where
    F: FnMut(&mut Value) -> Result<T, E> + Send,
    T: Send,
    E: From<SubdocError> + Send,
{
    for attempt in 1..=MAXIMUM_ATTEMPTS {
        let document = engine
            .load(vbucket, key)
            .await
            .map_err(|e| E::from(SubdocError::from(e)))?;
        if cas != 0 && cas != document.cas {
            return Err(E::from(SubdocError::KeyExists));
        }

        let mut root = parse_stored(&document).map_err(E::from)?;
        let output = apply(&mut root)?;

        let value = root.to_json_bytes().map_err(E::from)?;
        if value.len() > MAX_DOCUMENT_SIZE {
            return Err(E::from(SubdocError::ValueTooLarge));
        }
        let request = StoreRequest {
            value,
            datatype: DATATYPE_JSON,
            expected_cas: Some(document.cas),
            flags: document.flags,
            expiry: match expiry {
                Some(expiry) => to_absolute(expiry, unix_now()),
                None => document.expiry,
            },
        };

        match engine.store(vbucket, key, request).await {
            Ok(info) => return Ok(Committed { info, output }),
            Err(StorageError::CasMismatch | StorageError::NotFound) if cas == 0 => {
                debug!(
                    "Concurrent modification of a document in vbucket {} (attempt {})",
                    vbucket, attempt
                );
            }
            Err(e) => return Err(E::from(SubdocError::from(e))),
        }
    }

    warn!(
        "Giving up on a document in vbucket {} after {} conflicting stores",
        vbucket, MAXIMUM_ATTEMPTS
    );
    Err(E::from(SubdocError::TemporaryFailure))
}
