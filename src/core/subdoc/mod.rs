// src/core/subdoc/mod.rs

//! The sub-document engine: a JSON tree, a path language over it, and the
//! lookup and mutation primitives the protocol commands are built from.
//!
//! Everything in here is synchronous and stateless; the command processors
//! own loading and storing documents.

pub mod eval;
pub mod ops;
pub mod path;
pub mod value;

pub use ops::{LookupOp, MutationOp, SubdocFlags, SubdocOp};
pub use path::{Path, PathComponent};
pub use value::Value;

/// Maximum number of components a path may have.
pub const MAX_SUBDOC_PATH_COMPONENTS: usize = 32;

/// Maximum length in bytes of a path on the wire.
pub const SUBDOC_PATH_MAX_LENGTH: usize = 1024;

/// Maximum level a value may occupy, the document root being level 1.
pub const MAX_SUBDOC_DEPTH: usize = 32;
