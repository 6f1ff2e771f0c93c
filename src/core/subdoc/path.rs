// src/core/subdoc/path.rs

//! Parsing of sub-document path expressions.
//!
//! Supported syntax:
//! - `foo` - object key
//! - `foo.bar` - nested keys
//! - `[0]`, `foo[2]` - array element
//! - `foo[-1]` - last array element
//! - `` `a.b`.c `` - key containing separators, with ` `` ` for a literal backtick
//! - empty string - the document root

use super::MAX_SUBDOC_PATH_COMPONENTS;
use crate::core::SubdocError;
use std::fmt;
use std::str::FromStr;

/// A single step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    /// Object member lookup.
    Key(String),
    /// Array element at a non-negative position.
    Index(usize),
    /// The last array element, written `[-1]`.
    Last,
}

/// A parsed path. The empty path addresses the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    components: Vec<PathComponent>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(components: Vec<PathComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn last(&self) -> Option<&PathComponent> {
        self.components.last()
    }

    /// Parses a path expression.
    ///
    /// Syntax errors are reported as `PathInvalid`; exceeding the component
    /// limit is a request error (`InvalidArguments`).
    pub fn parse(text: &str) -> Result<Self, SubdocError> {
        let mut components = Vec::new();
        let bytes = text.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            let (component, next) = match bytes[pos] {
                b'[' => parse_index(text, pos)?,
                b'.' if !components.is_empty() => parse_key(text, pos + 1)?,
                b'.' => return Err(SubdocError::PathInvalid("path starts with '.'")),
                _ if components.is_empty() => parse_key(text, pos)?,
                _ => return Err(SubdocError::PathInvalid("expected '.' or '[' between components")),
            };
            components.push(component);
            if components.len() > MAX_SUBDOC_PATH_COMPONENTS {
                return Err(SubdocError::InvalidArguments("too many path components"));
            }
            pos = next;
        }

        Ok(Self { components })
    }
}

/// Parses `[n]` or `[-1]` starting at the opening bracket.
fn parse_index(text: &str, open: usize) -> Result<(PathComponent, usize), SubdocError> {
    let Some(len) = text[open + 1..].find(']') else {
        return Err(SubdocError::PathInvalid("unterminated '['"));
    };
    let inner = &text[open + 1..open + 1 + len];
    let next = open + len + 2;

    if inner == "-1" {
        return Ok((PathComponent::Last, next));
    }
    if inner.starts_with('-') {
        return Err(SubdocError::PathInvalid("negative index other than -1"));
    }
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SubdocError::PathInvalid("array index is not a number"));
    }
    let index = inner
        .parse::<usize>()
        .map_err(|_| SubdocError::PathInvalid("array index out of range"))?;
    Ok((PathComponent::Index(index), next))
}

/// Parses an object key starting at `start`, quoted or bare.
fn parse_key(text: &str, start: usize) -> Result<(PathComponent, usize), SubdocError> {
    let bytes = text.as_bytes();
    if bytes.get(start) == Some(&b'`') {
        return parse_quoted_key(text, start);
    }

    let len = text[start..]
        .find(['.', '['])
        .unwrap_or(text.len() - start);
    let key = &text[start..start + len];
    if key.is_empty() {
        return Err(SubdocError::PathInvalid("empty key"));
    }
    if key.contains([']', '`']) {
        return Err(SubdocError::PathInvalid("unexpected character in key"));
    }
    Ok((PathComponent::Key(key.to_string()), start + len))
}

fn parse_quoted_key(text: &str, open: usize) -> Result<(PathComponent, usize), SubdocError> {
    let mut key = String::new();
    let mut rest = &text[open + 1..];
    let mut consumed = open + 1;

    loop {
        let Some(tick) = rest.find('`') else {
            return Err(SubdocError::PathInvalid("unterminated '`'"));
        };
        key.push_str(&rest[..tick]);
        let after = &rest[tick + 1..];
        if let Some(escaped) = after.strip_prefix('`') {
            key.push('`');
            consumed += tick + 2;
            rest = escaped;
        } else {
            consumed += tick + 1;
            return Ok((PathComponent::Key(key), consumed));
        }
    }
}

impl FromStr for Path {
    type Err = SubdocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathComponent::Key(key) if needs_quoting(key) => {
                write!(f, "`{}`", key.replace('`', "``"))
            }
            PathComponent::Key(key) => f.write_str(key),
            PathComponent::Index(index) => write!(f, "[{index}]"),
            PathComponent::Last => f.write_str("[-1]"),
        }
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '`'])
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 && matches!(component, PathComponent::Key(_)) {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}
