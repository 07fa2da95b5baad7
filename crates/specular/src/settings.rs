//! Settings extraction
//!
//! Children whose key starts with `:` are settings. A concrete setting
//! applies to the node and is inherited by descendants that name the same
//! setting without a value.

use crate::node::Node;
use crate::path::{is_reserved, IntoPath};
use crate::value::Lookup;
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix marking a setting key
pub const SETTING_PREFIX: char = ':';

static EMPTY: Settings = Settings(BTreeMap::new());

/// One extracted entry
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// A `:` setting, `None` when neither set nor inherited
    Value(Option<Value>),
    /// Settings of a child node
    Nested(Settings),
}

/// Settings tree mirroring the shape of a spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings(BTreeMap<String, Setting>);

impl Settings {
    /// Create empty settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry under `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.0.get(key)
    }

    /// Value of the setting `key` at this level
    #[must_use]
    pub fn get_value(&self, key: &str) -> Lookup<'_> {
        match self.0.get(key) {
            Some(Setting::Value(value)) => Lookup::from_value(value.as_ref()),
            _ => Lookup::NotFound,
        }
    }

    /// Nested settings of child `key`, empty when there are none
    #[must_use]
    pub fn section(&self, key: &str) -> &Settings {
        match self.0.get(key) {
            Some(Setting::Nested(nested)) => nested,
            _ => &EMPTY,
        }
    }

    /// Entry at a nested path such as `top/middle/:name`
    #[must_use]
    pub fn lookup(&self, path: impl IntoPath) -> Option<&Setting> {
        let path = path.into_path();
        let (last, parents) = path.segments().split_last()?;
        let level = parents.iter().try_fold(self, |level, key| match level.0.get(key) {
            Some(Setting::Nested(nested)) => Some(nested),
            _ => None,
        })?;
        level.0.get(last)
    }

    /// Number of entries at this level
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries at this level
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Extract the settings tree of `node`
#[must_use]
pub fn extract_settings(node: &Node) -> Settings {
    extract(node, &BTreeMap::new())
}

fn extract(node: &Node, inherited: &BTreeMap<String, Option<Value>>) -> Settings {
    if node.nodes.is_empty() {
        return Settings::new();
    }

    let mut scope = inherited.clone();
    let mut out = BTreeMap::new();
    let mut subnodes = Vec::new();

    for (key, child) in &node.nodes {
        if is_reserved(key) {
            continue;
        }
        if key.starts_with(SETTING_PREFIX) {
            let value = match &child.value {
                Some(value) => {
                    scope.insert(key.clone(), Some(value.clone()));
                    Some(value.clone())
                }
                None => scope.entry(key.clone()).or_insert(None).clone(),
            };
            out.insert(key.clone(), Setting::Value(value));
        } else if !child.nodes.is_empty() {
            subnodes.push((key, child));
        }
    }

    for (key, child) in subnodes {
        let nested = extract(child, &scope);
        if !nested.is_empty() {
            out.insert(key.clone(), Setting::Nested(nested));
        }
    }

    Settings(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf_settings() -> Settings {
        let mut node = Node::new();
        node.setval(":a", json!(1));
        node.setval("x/:b", json!(2));
        node.setval("x/y", json!(0));
        extract_settings(&node)
    }

    #[test]
    fn section_and_lookup() {
        let settings = leaf_settings();
        assert_eq!(settings.get_value(":a"), json!(1));
        assert_eq!(settings.section("x").get_value(":b"), json!(2));
        assert!(settings.section("missing").is_empty());
        assert_eq!(
            settings.lookup("x/:b"),
            Some(&Setting::Value(Some(json!(2))))
        );
        assert!(settings.lookup("x/:zz").is_none());
        assert!(settings.lookup(()).is_none());
    }

    #[test]
    fn leaves_carry_no_settings() {
        let settings = leaf_settings();
        assert!(settings.section("x").get("y").is_none());
        assert_eq!(settings.get_value("x"), Lookup::NotFound);
    }

    #[test]
    fn empty_node_has_empty_settings() {
        assert!(extract_settings(&Node::new()).is_empty());
    }
}
