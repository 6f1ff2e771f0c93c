// src/core/mod.rs

//! The central module containing the protocol, the sub-document engine, the
//! storage interface and the commands that tie them together.

pub mod commands;
pub mod errors;
pub mod protocol;
pub mod storage;
pub mod subdoc;

pub use commands::Command;
pub use errors::SubdocError;
