// src/core/subdoc/eval.rs

//! Resolution of a [`Path`] against a [`Value`] tree.
//!
//! The root occupies level 1 and every step down adds one level. Visiting a
//! node deeper than [`MAX_SUBDOC_DEPTH`] fails with `PathTooBig`.

use super::{MAX_SUBDOC_DEPTH, Path, PathComponent, Value};
use crate::core::SubdocError;
use indexmap::IndexMap;

/// Level of the document root.
pub const ROOT_LEVEL: usize = 1;

/// The container a write lands in, and the step that selects the target.
#[derive(Debug)]
pub struct WriteTarget<'a, 'p> {
    pub parent: &'a mut Value,
    pub last: &'p PathComponent,
}

/// Level of the node `path` points at.
pub fn level_of(path: &Path) -> usize {
    ROOT_LEVEL + path.len()
}

fn check_level(level: usize) -> Result<(), SubdocError> {
    if level > MAX_SUBDOC_DEPTH {
        Err(SubdocError::PathTooBig)
    } else {
        Ok(())
    }
}

/// Fails with `ValueTooDeep` if `value` placed at `level` would reach below
/// the supported depth.
pub fn check_insert_depth(level: usize, value: &Value) -> Result<(), SubdocError> {
    if level + value.depth() - 1 > MAX_SUBDOC_DEPTH {
        Err(SubdocError::ValueTooDeep)
    } else {
        Ok(())
    }
}

/// Resolves `path` for reading.
pub fn resolve<'a>(root: &'a Value, path: &Path) -> Result<&'a Value, SubdocError> {
    let mut current = root;
    for (i, component) in path.components().iter().enumerate() {
        check_level(ROOT_LEVEL + i + 1)?;
        current = step(current, component)?;
    }
    Ok(current)
}

/// Resolves `path` for writing in place. Nothing is created.
pub fn resolve_mut<'a>(root: &'a mut Value, path: &Path) -> Result<&'a mut Value, SubdocError> {
    let mut current = root;
    for (i, component) in path.components().iter().enumerate() {
        check_level(ROOT_LEVEL + i + 1)?;
        current = step_mut(current, component, false)?;
    }
    Ok(current)
}

/// Resolves every component but the last one and returns the container the
/// final step applies to.
///
/// With `create_parents`, a missing object member is materialised as an empty
/// object when the component following it is itself a key. Array elements are
/// never created.
pub fn resolve_parent_mut<'a, 'p>(
    root: &'a mut Value,
    path: &'p Path,
    create_parents: bool,
) -> Result<WriteTarget<'a, 'p>, SubdocError> {
    let components = path.components();
    let Some((last, parents)) = components.split_last() else {
        return Err(SubdocError::InvalidArguments("path must not be empty"));
    };

    let mut current = root;
    for (i, component) in parents.iter().enumerate() {
        check_level(ROOT_LEVEL + i + 1)?;
        let next_is_key = matches!(components[i + 1], PathComponent::Key(_));
        current = step_mut(current, component, create_parents && next_is_key)?;
    }
    check_level(level_of(path))?;

    Ok(WriteTarget {
        parent: current,
        last,
    })
}

/// Takes one step down from `node`.
pub fn step<'a>(node: &'a Value, component: &PathComponent) -> Result<&'a Value, SubdocError> {
    match (component, node) {
        (PathComponent::Key(key), Value::Object(map)) => {
            map.get(key.as_str()).ok_or(SubdocError::PathNotFound)
        }
        (PathComponent::Index(index), Value::Array(items)) => {
            items.get(*index).ok_or(SubdocError::PathNotFound)
        }
        (PathComponent::Last, Value::Array(items)) => {
            items.last().ok_or(SubdocError::PathNotFound)
        }
        _ => Err(SubdocError::PathMismatch),
    }
}

/// Takes one mutable step down from `node`, creating an empty object for a
/// missing key when `create` is set.
pub fn step_mut<'a>(
    node: &'a mut Value,
    component: &PathComponent,
    create: bool,
) -> Result<&'a mut Value, SubdocError> {
    match component {
        PathComponent::Key(key) => {
            let Value::Object(map) = node else {
                return Err(SubdocError::PathMismatch);
            };
            if create && !map.contains_key(key.as_str()) {
                map.insert(key.clone(), Value::Object(IndexMap::new()));
            }
            map.get_mut(key.as_str()).ok_or(SubdocError::PathNotFound)
        }
        PathComponent::Index(index) => match node {
            Value::Array(items) => items.get_mut(*index).ok_or(SubdocError::PathNotFound),
            _ => Err(SubdocError::PathMismatch),
        },
        PathComponent::Last => match node {
            Value::Array(items) => items.last_mut().ok_or(SubdocError::PathNotFound),
            _ => Err(SubdocError::PathMismatch),
        },
    }
}
