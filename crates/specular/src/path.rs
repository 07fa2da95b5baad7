//! Paths and keys for addressing nodes within a spec
//!
//! Provides [`Path`] for hierarchical addressing plus the string-key
//! splitting rules used by source documents ([`key_to_path`]).

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Reserved segment holding a node's own value in source documents
pub const VALUE: &str = "=";
/// Reserved segment holding a node's predicates
pub const PREDICATES: &str = ".";
/// Reserved segment holding a node's template
pub const TEMPLATE: &str = "?";
/// Reserved root segment holding the schema registry
pub const SCHEMATA: &str = "$";
/// Reserved root segment holding the constructions registry
pub const CONSTRUCTIONS: &str = "#";

/// Whether a child segment is one of the reserved slots skipped by level iteration.
#[inline]
#[must_use]
pub fn is_reserved(segment: &str) -> bool {
    matches!(segment, PREDICATES | TEMPLATE | SCHEMATA | CONSTRUCTIONS)
}

/// Path of a node below its spec root
///
/// An ordered list of string segments. The empty path is the root.
///
/// # Examples
/// - `["hello", ".", "integer"]` → `hello/./integer`
/// - `[]` → `` (root)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Get first segment (if not root)
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Concatenate another path, returning new path
    #[inline]
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut new = self.clone();
        new.0.extend(other.0.iter().cloned());
        new
    }

    /// Append a segment in place
    #[inline]
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Join segments with custom separator
    #[inline]
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// Render as a `/`-joined key (see [`path_to_key`])
    #[inline]
    #[must_use]
    pub fn to_key(&self) -> String {
        self.0.join("/")
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(key_to_path(s))
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[String]> for Path {
    fn from(segments: &[String]) -> Self {
        Self(segments.to_vec())
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Split a string key into path segments
///
/// - `/` present: split on `/`
/// - otherwise the first of `.` or `?` present is kept as its own segment
///   after the (non-empty) prefix, and the rest is split on that separator
/// - a single trailing empty segment is dropped
///
/// # Examples
/// - `one.two.three` → `["one", ".", "two", "three"]`
/// - `?alpha?beta` → `["?", "alpha", "beta"]`
/// - `/one.two/three` → `["", "one.two", "three"]`
/// - `a.b..` → `["a", ".", "b", ""]`
#[must_use]
pub fn key_to_path(key: &str) -> Path {
    if key.is_empty() {
        return Path::root();
    }

    let mut out = Vec::new();
    let mut segments: Vec<&str> = if key.contains('/') {
        key.split('/').collect()
    } else {
        match ['.', '?']
            .iter()
            .find_map(|&sep| key.split_once(sep).map(|parts| (sep, parts)))
        {
            Some((sep, (prefix, suffix))) => {
                if !prefix.is_empty() {
                    out.push(prefix.to_string());
                }
                out.push(sep.to_string());
                suffix.split(sep).collect()
            }
            None => vec![key],
        }
    };

    if segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    out.extend(segments.into_iter().map(str::to_string));
    Path(out)
}

/// Render a path as a `/`-joined key
///
/// Not an exact inverse of [`key_to_path`] for segments containing separators.
#[inline]
#[must_use]
pub fn path_to_key(path: &Path) -> String {
    path.to_key()
}

/// Conversion into a [`Path`]
///
/// String keys go through [`key_to_path`]; arrays and slices are taken as
/// literal segments.
pub trait IntoPath {
    /// Convert into a path
    fn into_path(self) -> Path;
}

impl IntoPath for Path {
    fn into_path(self) -> Path {
        self
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Path {
        self.clone()
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Path {
        key_to_path(self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Path {
        key_to_path(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Path {
        key_to_path(&self)
    }
}

impl IntoPath for () {
    fn into_path(self) -> Path {
        Path::root()
    }
}

impl<const N: usize> IntoPath for [&str; N] {
    fn into_path(self) -> Path {
        Path::from(self)
    }
}

impl IntoPath for &[&str] {
    fn into_path(self) -> Path {
        Path::from(self)
    }
}

impl IntoPath for Vec<String> {
    fn into_path(self) -> Path {
        Path(self)
    }
}
