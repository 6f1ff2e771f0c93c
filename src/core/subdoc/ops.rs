// src/core/subdoc/ops.rs

//! The lookup and mutation primitives, one per sub-document opcode.
//!
//! Each primitive is a pure function of the tree, the path, the client
//! fragment and the flags. Mutations edit the tree in place; callers work on a
//! private copy and discard it when an error is returned.

use super::eval::{
    WriteTarget, check_insert_depth, level_of, resolve, resolve_mut, resolve_parent_mut, step_mut,
};
use super::{Path, PathComponent, Value};
use crate::core::SubdocError;
use crate::core::protocol::Opcode;
use bitflags::bitflags;
use bytes::Bytes;
use serde_json::Number;

bitflags! {
    /// Per-path flags carried in the request extras.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubdocFlags: u8 {
        /// Create missing intermediate dictionaries (and, for whole-array
        /// operations, the target array itself).
        const MKDIR_P = 0x01;
    }
}

/// Read-only operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupOp {
    Get,
    Exists,
}

/// Operations that modify the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOp {
    DictAdd,
    DictUpsert,
    Delete,
    Replace,
    ArrayPushLast,
    ArrayPushFirst,
    ArrayInsert,
    ArrayAddUnique,
    Counter,
}

/// Any single-path sub-document operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubdocOp {
    Lookup(LookupOp),
    Mutation(MutationOp),
}

impl SubdocOp {
    pub fn opcode(self) -> Opcode {
        match self {
            SubdocOp::Lookup(LookupOp::Get) => Opcode::SubdocGet,
            SubdocOp::Lookup(LookupOp::Exists) => Opcode::SubdocExists,
            SubdocOp::Mutation(op) => op.opcode(),
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, SubdocOp::Mutation(_))
    }

    /// Checks the request shape of one path operation before any document is
    /// touched. Every violation is a plain `InvalidArguments`.
    pub fn validate(
        self,
        path_is_root: bool,
        value: &[u8],
        flags: SubdocFlags,
    ) -> Result<(), SubdocError> {
        match self {
            SubdocOp::Lookup(_) => {
                if !flags.is_empty() {
                    return Err(SubdocError::InvalidArguments("flags not allowed on lookups"));
                }
                if !value.is_empty() {
                    return Err(SubdocError::InvalidArguments("value not allowed on lookups"));
                }
                if path_is_root {
                    return Err(SubdocError::InvalidArguments("path must not be empty"));
                }
            }
            SubdocOp::Mutation(op) => {
                if op == MutationOp::Delete && !value.is_empty() {
                    return Err(SubdocError::InvalidArguments("value not allowed on delete"));
                }
                if op != MutationOp::Delete && value.is_empty() {
                    return Err(SubdocError::InvalidArguments("value required"));
                }
                if op == MutationOp::ArrayInsert && flags.contains(SubdocFlags::MKDIR_P) {
                    return Err(SubdocError::InvalidArguments("MKDIR_P not allowed on array insert"));
                }
                if path_is_root && !op.allows_root_path() {
                    return Err(SubdocError::InvalidArguments("path must not be empty"));
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Opcode> for SubdocOp {
    type Error = SubdocError;

    fn try_from(opcode: Opcode) -> Result<Self, Self::Error> {
        let op = match opcode {
            Opcode::SubdocGet => SubdocOp::Lookup(LookupOp::Get),
            Opcode::SubdocExists => SubdocOp::Lookup(LookupOp::Exists),
            Opcode::SubdocDictAdd => SubdocOp::Mutation(MutationOp::DictAdd),
            Opcode::SubdocDictUpsert => SubdocOp::Mutation(MutationOp::DictUpsert),
            Opcode::SubdocDelete => SubdocOp::Mutation(MutationOp::Delete),
            Opcode::SubdocReplace => SubdocOp::Mutation(MutationOp::Replace),
            Opcode::SubdocArrayPushLast => SubdocOp::Mutation(MutationOp::ArrayPushLast),
            Opcode::SubdocArrayPushFirst => SubdocOp::Mutation(MutationOp::ArrayPushFirst),
            Opcode::SubdocArrayInsert => SubdocOp::Mutation(MutationOp::ArrayInsert),
            Opcode::SubdocArrayAddUnique => SubdocOp::Mutation(MutationOp::ArrayAddUnique),
            Opcode::SubdocCounter => SubdocOp::Mutation(MutationOp::Counter),
            _ => return Err(SubdocError::InvalidArguments("not a single-path opcode")),
        };
        Ok(op)
    }
}

impl MutationOp {
    pub fn opcode(self) -> Opcode {
        match self {
            MutationOp::DictAdd => Opcode::SubdocDictAdd,
            MutationOp::DictUpsert => Opcode::SubdocDictUpsert,
            MutationOp::Delete => Opcode::SubdocDelete,
            MutationOp::Replace => Opcode::SubdocReplace,
            MutationOp::ArrayPushLast => Opcode::SubdocArrayPushLast,
            MutationOp::ArrayPushFirst => Opcode::SubdocArrayPushFirst,
            MutationOp::ArrayInsert => Opcode::SubdocArrayInsert,
            MutationOp::ArrayAddUnique => Opcode::SubdocArrayAddUnique,
            MutationOp::Counter => Opcode::SubdocCounter,
        }
    }

    /// The whole-array operations may address the document root.
    pub fn allows_root_path(self) -> bool {
        matches!(
            self,
            MutationOp::ArrayPushLast | MutationOp::ArrayPushFirst | MutationOp::ArrayAddUnique
        )
    }
}

/// Runs a lookup. `Get` returns the compact serialization of the subtree,
/// `Exists` returns nothing.
pub fn lookup(root: &Value, op: LookupOp, path: &Path) -> Result<Option<Bytes>, SubdocError> {
    if !root.is_container() {
        return Err(SubdocError::DocNotJson);
    }
    let found = resolve(root, path)?;
    match op {
        LookupOp::Get => found.to_json_bytes().map(Some),
        LookupOp::Exists => Ok(None),
    }
}

/// Applies a mutation to `root`. Only `Counter` produces output: the new
/// value in decimal.
pub fn mutate(
    root: &mut Value,
    op: MutationOp,
    path: &Path,
    value: &[u8],
    flags: SubdocFlags,
) -> Result<Option<Bytes>, SubdocError> {
    if !root.is_container() {
        return Err(SubdocError::DocNotJson);
    }
    let mkdir = flags.contains(SubdocFlags::MKDIR_P);
    match op {
        MutationOp::DictAdd => dict_store(root, path, value, mkdir, false),
        MutationOp::DictUpsert => dict_store(root, path, value, mkdir, true),
        MutationOp::Delete => delete(root, path),
        MutationOp::Replace => replace(root, path, value),
        MutationOp::ArrayPushLast => array_push(root, path, value, mkdir, false),
        MutationOp::ArrayPushFirst => array_push(root, path, value, mkdir, true),
        MutationOp::ArrayInsert => array_insert(root, path, value),
        MutationOp::ArrayAddUnique => array_add_unique(root, path, value, mkdir),
        MutationOp::Counter => return counter(root, path, value, mkdir).map(Some),
    }
    .map(|()| None)
}

fn dict_store(
    root: &mut Value,
    path: &Path,
    value: &[u8],
    mkdir: bool,
    overwrite: bool,
) -> Result<(), SubdocError> {
    let new_value = Value::parse_fragment(value)?;
    let WriteTarget { parent, last } = resolve_parent_mut(root, path, mkdir)?;
    check_insert_depth(level_of(path), &new_value)?;

    match (last, parent) {
        (PathComponent::Key(key), Value::Object(map)) => {
            if !overwrite && map.contains_key(key.as_str()) {
                return Err(SubdocError::PathExists);
            }
            map.insert(key.clone(), new_value);
            Ok(())
        }
        _ => Err(SubdocError::PathMismatch),
    }
}

fn delete(root: &mut Value, path: &Path) -> Result<(), SubdocError> {
    let WriteTarget { parent, last } = resolve_parent_mut(root, path, false)?;
    match (last, parent) {
        (PathComponent::Key(key), Value::Object(map)) => map
            .shift_remove(key.as_str())
            .map(drop)
            .ok_or(SubdocError::PathNotFound),
        (PathComponent::Index(index), Value::Array(items)) => {
            if *index < items.len() {
                items.remove(*index);
                Ok(())
            } else {
                Err(SubdocError::PathNotFound)
            }
        }
        (PathComponent::Last, Value::Array(items)) => {
            items.pop().map(drop).ok_or(SubdocError::PathNotFound)
        }
        _ => Err(SubdocError::PathMismatch),
    }
}

fn replace(root: &mut Value, path: &Path, value: &[u8]) -> Result<(), SubdocError> {
    let new_value = Value::parse_fragment(value)?;
    let slot = resolve_mut(root, path)?;
    check_insert_depth(level_of(path), &new_value)?;
    *slot = new_value;
    Ok(())
}

/// Resolves the array a whole-array operation targets. With `mkdir`, a
/// missing final key of an object parent is created as an empty array.
fn resolve_array<'a>(
    root: &'a mut Value,
    path: &Path,
    mkdir: bool,
) -> Result<&'a mut Vec<Value>, SubdocError> {
    let target = if path.is_root() {
        root
    } else {
        let WriteTarget { parent, last } = resolve_parent_mut(root, path, mkdir)?;
        if let (PathComponent::Key(key), Value::Object(map)) = (last, &mut *parent)
            && mkdir
            && !map.contains_key(key.as_str())
        {
            map.insert(key.clone(), Value::Array(Vec::new()));
        }
        step_mut(parent, last, false)?
    };
    match target {
        Value::Array(items) => Ok(items),
        _ => Err(SubdocError::PathMismatch),
    }
}

fn array_push(
    root: &mut Value,
    path: &Path,
    value: &[u8],
    mkdir: bool,
    front: bool,
) -> Result<(), SubdocError> {
    let new_items = Value::parse_fragment_list(value)?;
    let element_level = level_of(path) + 1;
    let items = resolve_array(root, path, mkdir)?;
    for item in &new_items {
        check_insert_depth(element_level, item)?;
    }

    if front {
        items.splice(0..0, new_items);
    } else {
        items.extend(new_items);
    }
    Ok(())
}

fn array_insert(root: &mut Value, path: &Path, value: &[u8]) -> Result<(), SubdocError> {
    let Some(PathComponent::Index(index)) = path.last() else {
        return Err(SubdocError::PathInvalid(
            "array insert requires a non-negative index as the final component",
        ));
    };
    let index = *index;
    let new_items = Value::parse_fragment_list(value)?;
    let WriteTarget { parent, .. } = resolve_parent_mut(root, path, false)?;
    let Value::Array(items) = parent else {
        return Err(SubdocError::PathMismatch);
    };
    if index > items.len() {
        return Err(SubdocError::PathNotFound);
    }
    for item in &new_items {
        check_insert_depth(level_of(path), item)?;
    }
    items.splice(index..index, new_items);
    Ok(())
}

fn array_add_unique(
    root: &mut Value,
    path: &Path,
    value: &[u8],
    mkdir: bool,
) -> Result<(), SubdocError> {
    let new_value = Value::parse_fragment(value)?;
    let element_level = level_of(path) + 1;
    let items = resolve_array(root, path, mkdir)?;

    for existing in items.iter() {
        if !existing.is_primitive() {
            return Err(SubdocError::PathMismatch);
        }
        if *existing == new_value {
            return Err(SubdocError::PathExists);
        }
    }
    // Non-primitive new values are accepted.
    check_insert_depth(element_level, &new_value)?;
    items.push(new_value);
    Ok(())
}

fn counter(root: &mut Value, path: &Path, value: &[u8], mkdir: bool) -> Result<Bytes, SubdocError> {
    let delta = parse_delta(value)?;
    let WriteTarget { parent, last } = resolve_parent_mut(root, path, mkdir)?;

    let result = match (last, parent) {
        (PathComponent::Key(key), Value::Object(map)) if !map.contains_key(key.as_str()) => {
            map.insert(key.clone(), Value::from(delta));
            delta
        }
        (last, parent) => {
            let slot = step_mut(parent, last, false)?;
            let current = match &*slot {
                Value::Number(n) => counter_operand(n)?,
                _ => return Err(SubdocError::PathMismatch),
            };
            let result = current
                .checked_add(delta)
                .ok_or(SubdocError::ValueCantInsert)?;
            *slot = Value::from(result);
            result
        }
    };

    let mut buf = itoa::Buffer::new();
    Ok(Bytes::copy_from_slice(buf.format(result).as_bytes()))
}

/// Parses a counter delta: a non-zero base-10 signed 64-bit integer.
fn parse_delta(value: &[u8]) -> Result<i64, SubdocError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .filter(|delta| *delta != 0)
        .ok_or(SubdocError::DeltaInvalid)
}

/// Interprets an existing number as a counter. Integers that do not fit in an
/// i64 are out of range; anything non-integral is a type mismatch.
fn counter_operand(n: &Number) -> Result<i64, SubdocError> {
    if let Some(current) = n.as_i64() {
        return Ok(current);
    }
    let text = n.to_string();
    let digits = text.strip_prefix('-').unwrap_or(&text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Err(SubdocError::NumberOutOfRange)
    } else {
        Err(SubdocError::PathMismatch)
    }
}
