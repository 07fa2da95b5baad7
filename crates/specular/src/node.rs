//! Spec tree nodes
//!
//! A [`Node`] holds an optional concrete value and its children keyed by
//! path segment. The reserved children `.` and `?` hold the node's
//! predicates and template.

use crate::path::{is_reserved, IntoPath, Path, PREDICATES, TEMPLATE, VALUE};
use crate::value::Lookup;
use crate::walk::{Visit, Walk};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of a spec tree
///
/// A node with neither value nor children is `ANY`: no value, no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub(crate) value: Option<Value>,
    pub(crate) nodes: BTreeMap<String, Node>,
}

impl Node {
    /// Create an empty (`ANY`) node
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a childless node holding `value`
    #[inline]
    #[must_use]
    pub fn leaf(value: Value) -> Self {
        Self {
            value: Some(value),
            nodes: BTreeMap::new(),
        }
    }

    /// Concrete value, `None` when unset
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Children keyed by segment, reserved slots included
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.nodes
    }

    /// Direct child
    #[inline]
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Node> {
        self.nodes.get(segment)
    }

    /// Whether the node carries neither value nor children
    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.value.is_none() && self.nodes.is_empty()
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the node has no children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Predicates subtree (`.`)
    #[inline]
    #[must_use]
    pub fn predicates(&self) -> Option<&Node> {
        self.nodes.get(PREDICATES)
    }

    /// Template subtree (`?`)
    #[inline]
    #[must_use]
    pub fn template(&self) -> Option<&Node> {
        self.nodes.get(TEMPLATE)
    }

    /// Descend along `path`
    #[must_use]
    pub fn getpath(&self, path: impl IntoPath) -> Option<&Node> {
        let path = path.into_path();
        let node = path.iter().try_fold(self, |node, segment| node.nodes.get(segment));
        node
    }

    pub(crate) fn getpath_mut(&mut self, path: &Path) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, segment| node.nodes.get_mut(segment))
    }

    /// Three-state lookup of the value at `path`
    #[must_use]
    pub fn get(&self, path: impl IntoPath) -> Lookup<'_> {
        match self.getpath(path) {
            None => Lookup::NotFound,
            Some(node) => Lookup::from_value(node.value.as_ref()),
        }
    }

    /// Whether a node exists at `path`
    #[must_use]
    pub fn contains(&self, path: impl IntoPath) -> bool {
        self.getpath(path).is_some()
    }

    /// Set the value at `path`, creating nodes on the way
    ///
    /// Returns the previous value. No merge rules apply.
    pub fn setval(&mut self, path: impl IntoPath, value: Value) -> Option<Value> {
        let path = path.into_path();
        let target = path.iter().fold(self, |node, segment| {
            node.nodes.entry(segment.to_string()).or_default()
        });
        target.value.replace(value)
    }

    /// Direct children's values, reserved slots skipped
    pub fn iter_level_values(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.nodes
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, node)| (key.as_str(), node.value.as_ref()))
    }

    /// Direct children's locations with their output in `artifacts`,
    /// given this node sits at `loc`
    #[must_use]
    pub fn iter_level_outputs<'a>(
        &self,
        loc: &Path,
        artifacts: &'a BTreeMap<Path, Value>,
    ) -> Vec<(Path, Option<&'a Value>)> {
        self.iter_level_values()
            .map(|(key, _)| {
                let subloc = loc.child(key);
                let output = artifacts.get(&subloc);
                (subloc, output)
            })
            .collect()
    }

    /// Concrete values of all regular descendants, keyed by their
    /// `__`-joined relative path
    ///
    /// Predicates and templates are not entered. Used as constructor
    /// arguments.
    #[must_use]
    pub fn kwargs(&self) -> Map<String, Value> {
        let mut out = Map::new();
        Walk::postorder().run(self, |path, node, _| {
            if !path.is_empty() {
                if let Some(value) = &node.value {
                    out.insert(path.join("__"), value.clone());
                }
            }
            Visit::Continue
        });
        out
    }

    /// Render as a document whose normalization rebuilds this tree
    ///
    /// `ANY` renders as `{}`, a childless node as `{"=": value}`.
    #[must_use]
    pub fn to_source(&self) -> Value {
        let mut out = Map::new();
        for (key, child) in &self.nodes {
            out.insert(key.clone(), child.to_source());
        }
        if let Some(value) = &self.value {
            out.insert(VALUE.to_string(), value.clone());
        }
        Value::Object(out)
    }
}
