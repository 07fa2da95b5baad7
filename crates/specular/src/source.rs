//! Document normalization
//!
//! Arbitrary JSON documents are turned into a canonical [`Source`] tree
//! keyed by path segments before they are compiled into a spec.

use crate::error::{Error, Result, What};
use crate::path::{key_to_path, Path, VALUE};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Canonical source tree
///
/// Every node holds an optional value (the document's `=` entry) and
/// children keyed by single path segments. An empty source means "no
/// value, no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub(crate) value: Option<Value>,
    pub(crate) children: BTreeMap<String, Source>,
}

impl Source {
    /// Source holding only a value
    #[inline]
    #[must_use]
    pub fn leaf(value: Value) -> Self {
        Self {
            value: Some(value),
            children: BTreeMap::new(),
        }
    }

    /// The node's own value
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Child sources keyed by segment
    #[inline]
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, Source> {
        &self.children
    }

    /// Whether the source carries neither value nor children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn descend_mut(&mut self, path: &Path) -> &mut Source {
        path.iter().fold(self, |node, segment| {
            node.children.entry(segment.to_string()).or_default()
        })
    }

    /// Render back into a document whose normalization equals `self`
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut out = Map::new();
        for (key, child) in &self.children {
            out.insert(key.clone(), child.to_document());
        }
        if let Some(value) = &self.value {
            out.insert(VALUE.to_string(), value.clone());
        }
        Value::Object(out)
    }
}

/// Normalize a document into a [`Source`] tree
///
/// - arrays become objects keyed by zero-padded index
/// - object keys are split with [`key_to_path`] and merged along the path
/// - the `=` key sets the node's own value without recursing into it
/// - any other value becomes the node's value
///
/// # Errors
/// - `invalid` when a key places `=` as a path segment
/// - `cannot-normalize` when two keys set different values at one path
pub fn normalize_source(doc: &Value) -> Result<Source> {
    match doc {
        Value::Array(items) => {
            let width = items.len().to_string().len();
            let mut entries: Vec<(String, &Value)> = items
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("{i:0width$}"), v))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            normalize_entries(entries)
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, &Value)> =
                map.iter().map(|(k, v)| (k.clone(), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            normalize_entries(entries)
        }
        other => Ok(Source::leaf(other.clone())),
    }
}

fn normalize_entries(entries: Vec<(String, &Value)>) -> Result<Source> {
    let mut out = Source::default();
    for (key, subdoc) in entries {
        if key == VALUE {
            out.value = Some(subdoc.clone());
            continue;
        }

        let path = key_to_path(&key);
        if path.iter().any(|segment| segment == VALUE) {
            return Err(Error::invalid("cannot use '=' as a source path segment")
                .at(path)
                .with_data("key", key));
        }

        let subsource = normalize_source(subdoc)?;
        let target = out.descend_mut(&path);
        merge_source(target, subsource, &path)?;
    }
    Ok(out)
}

/// Merge `source` into `target`, matching equal values and extending children
///
/// # Errors
/// `cannot-normalize` when both sides hold different values at one path.
pub fn merge_source(target: &mut Source, source: Source, loc: &Path) -> Result<()> {
    if let Some(value) = source.value {
        match &target.value {
            Some(existing) if *existing != value => {
                return Err(Error::new(What::CannotNormalize)
                    .with_message("value mismatch")
                    .at(loc.clone())
                    .with_data("target", existing.clone())
                    .with_data("source", value));
            }
            Some(_) => {}
            None => target.value = Some(value),
        }
    }

    for (key, child) in source.children {
        match target.children.get_mut(&key) {
            Some(existing) => merge_source(existing, child, &loc.child(key.as_str()))?,
            None => {
                target.children.insert(key, child);
            }
        }
    }
    Ok(())
}
