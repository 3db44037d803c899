//! Dotted property paths
//!
//! A parameter name such as `bag_param.str_param` or `vector3_param.x` is a
//! [`PropertyPath`]: one segment per level, from the root bag down to the leaf.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Address of a leaf (or container) inside a property tree
///
/// Segments are non-empty and made of alphanumerics and `_`. The empty path
/// denotes the root bag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    /// The root bag
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Segments, root first
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path one level below this one
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment.into());
        Self(segments)
    }

    /// Every strict ancestor, shortest first (`a`, `a.b` for `a.b.c`)
    pub fn ancestors(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        (1..self.0.len()).map(move |n| Self(self.0[..n].to_vec()))
    }

    /// Whether `other` lies strictly below this path
    ///
    /// `a` is an ancestor of `a.b` but not of `a`, `ab` or `b.a`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl Display for PropertyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|segment| {
                if segment.is_empty() {
                    Err(PathError::EmptySegment(s.to_string()))
                } else if segment.chars().any(|c| !c.is_alphanumeric() && c != '_') {
                    Err(PathError::InvalidSegment(segment.to_string()))
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

/// Malformed parameter names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// `a..b`, a leading or a trailing dot
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Characters other than alphanumerics and `_`
    #[error("invalid segment: {0} (must be alphanumeric or underscore)")]
    InvalidSegment(String),
}
