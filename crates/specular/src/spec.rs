//! Specs
//!
//! A [`Spec`] pairs a root [`Node`] with the [`Domain`] it was compiled
//! against. It is the entry point for compiling, configuring, inspecting
//! and constructing documents.

use crate::compile::{compile, config, config_value};
use crate::construct::{construct_tree, Artifacts, ConstructError, ConstructOptions};
use crate::domain::Domain;
use crate::error::{Error, Result, What};
use crate::node::Node;
use crate::path::{IntoPath, Path};
use crate::settings::{extract_settings, Settings};
use crate::source::normalize_source;
use crate::value::Lookup;
use crate::walk::{Order, Visit, Walk};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Flags for [`Spec::config_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMode {
    /// Allow new keys and values
    pub mutable: bool,
    /// Require a template for new keys on populated nodes;
    /// `None` uses the domain configuration
    pub strict: Option<bool>,
}

impl Default for ConfigMode {
    fn default() -> Self {
        Self {
            mutable: true,
            strict: None,
        }
    }
}

impl ConfigMode {
    /// Mutable, strictness from the domain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With mutability
    #[inline]
    #[must_use]
    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    /// With explicit strictness
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }
}

/// A compiled spec tree bound to its domain
///
/// `Clone` deep-copies the tree and shares the domain.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    domain: Domain,
    root: Node,
}

impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Spec {
    /// Empty spec with a fresh domain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty spec bound to `domain`
    #[inline]
    #[must_use]
    pub fn with_domain(domain: Domain) -> Self {
        Self {
            domain,
            root: Node::new(),
        }
    }

    /// Owning domain
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Take the root node
    #[inline]
    #[must_use]
    pub fn into_root(self) -> Node {
        self.root
    }

    /// Compile `doc` into this spec
    ///
    /// # Errors
    /// See [`Spec::compile_with`].
    pub fn compile(&mut self, doc: &Value) -> Result<BTreeSet<String>> {
        self.compile_with(doc, None, false)
    }

    /// Compile `doc`, optionally collecting errors and allowing `$`/`#`
    ///
    /// Returns the predicates whose schema is not registered yet.
    ///
    /// # Errors
    /// - normalization errors
    /// - `schemata-config-not-allowed` / `constructions-config-not-allowed`
    ///   without `register`
    /// - `compile-failed` when errors were collected and no sink was given
    pub fn compile_with(
        &mut self,
        doc: &Value,
        errs: Option<&mut Vec<Error>>,
        register: bool,
    ) -> Result<BTreeSet<String>> {
        let source = normalize_source(doc)?;
        let mut own = Vec::new();
        let sink = errs.unwrap_or(&mut own);
        let unknown = compile(&mut self.root, &Path::root(), &self.domain, source, sink, register)?;

        if !own.is_empty() {
            debug!(errors = own.len(), "compile failed");
            return Err(Error::aggregate(What::CompileFailed, own).with_message("compile failed"));
        }
        Ok(unknown)
    }

    /// Merge `doc` into this spec
    ///
    /// # Errors
    /// See [`Spec::config_with`].
    pub fn config(&mut self, doc: &Value) -> Result<()> {
        self.config_with(doc, None, ConfigMode::default())
    }

    /// Merge `doc` into this spec with explicit flags
    ///
    /// # Errors
    /// Normalization errors, or `config-failed` when errors were collected
    /// and no sink was given.
    pub fn config_with(
        &mut self,
        doc: &Value,
        errs: Option<&mut Vec<Error>>,
        mode: ConfigMode,
    ) -> Result<()> {
        let source = normalize_source(doc)?;
        let mut own = Vec::new();
        let sink = errs.unwrap_or(&mut own);

        let mut incoming = Node::new();
        compile(&mut incoming, &Path::root(), &self.domain, source, sink, false)?;
        self.apply(&incoming, sink, mode);

        if !own.is_empty() {
            debug!(errors = own.len(), "config failed");
            return Err(Error::aggregate(What::ConfigFailed, own));
        }
        Ok(())
    }

    /// Merge another compiled spec into this one
    ///
    /// # Errors
    /// `config-failed` carrying the collected errors.
    pub fn config_spec(&mut self, other: &Spec) -> Result<()> {
        let mut errs = Vec::new();
        self.apply(&other.root, &mut errs, ConfigMode::default());
        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::aggregate(What::ConfigFailed, errs))
        }
    }

    fn apply(&mut self, incoming: &Node, errs: &mut Vec<Error>, mode: ConfigMode) {
        let strict = mode.strict.unwrap_or_else(|| self.domain.config().strict);
        config(
            &mut self.root,
            &Path::root(),
            &self.domain,
            incoming,
            errs,
            mode.mutable,
            strict,
        );
    }

    /// Set the root value following the config rules; `None` is a no-op
    pub fn config_value(&mut self, value: Option<&Value>, errs: &mut Vec<Error>, mutable: bool) {
        if let Some(value) = value {
            config_value(&mut self.root, &Path::root(), value, errs, mutable);
        }
    }

    /// Three-state lookup of the value at `path`
    #[must_use]
    pub fn get(&self, path: impl IntoPath) -> Lookup<'_> {
        self.root.get(path)
    }

    /// Node at `path`
    #[must_use]
    pub fn getpath(&self, path: impl IntoPath) -> Option<&Node> {
        self.root.getpath(path)
    }

    /// Set the value at `path` without merge rules, returning the old one
    pub fn set(&mut self, path: impl IntoPath, value: Value) -> Option<Value> {
        self.root.setval(path, value)
    }

    /// Whether a node exists at `path`
    #[must_use]
    pub fn contains(&self, path: impl IntoPath) -> bool {
        self.root.contains(path)
    }

    /// Number of root children
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether the spec has no value and no children
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_any()
    }

    /// Every path in pre-order, predicates and template included
    #[must_use]
    pub fn keys(&self) -> Vec<Path> {
        self.items().into_iter().map(|(path, _)| path).collect()
    }

    /// Every value in pre-order, predicates and template included
    #[must_use]
    pub fn values(&self) -> Vec<Option<&Value>> {
        self.items().into_iter().map(|(_, value)| value).collect()
    }

    /// Every `(path, value)` in pre-order, predicates and template included
    #[must_use]
    pub fn items(&self) -> Vec<(Path, Option<&Value>)> {
        Walk::preorder()
            .with_predicates()
            .with_template()
            .collect(&self.root)
            .into_iter()
            .map(|(path, node)| (path, node.value()))
            .collect()
    }

    /// Values of the root's regular children
    pub fn iter_level_values(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.root.iter_level_values()
    }

    /// Walk the tree with a visitor
    pub fn iterall<'a, F>(&'a self, walk: Walk, visit: F) -> bool
    where
        F: FnMut(&Path, &'a Node, Order) -> Visit,
    {
        walk.run(&self.root, visit)
    }

    /// Document rendering of the tree
    #[must_use]
    pub fn to_source(&self) -> Value {
        self.root.to_source()
    }

    /// Concrete values below the root keyed by `__`-joined path
    #[must_use]
    pub fn kwargs(&self) -> Map<String, Value> {
        self.root.kwargs()
    }

    /// Settings tree of the spec
    #[must_use]
    pub fn extract_settings(&self) -> Settings {
        extract_settings(&self.root)
    }

    /// Run every construction of the domain
    ///
    /// # Errors
    /// `Failed` with `construction-failed` when constructors failed,
    /// `Deadlock` when constructors keep deferring.
    pub fn construct(&self) -> Result<Artifacts, ConstructError> {
        let mut artifacts = Artifacts::new();
        self.construct_into(&mut artifacts, &ConstructOptions::default(), None)?;
        Ok(artifacts)
    }

    /// Run constructions into existing artifacts
    ///
    /// # Errors
    /// As [`Spec::construct`]; collected failures go to `errs` when given.
    pub fn construct_into(
        &self,
        artifacts: &mut Artifacts,
        options: &ConstructOptions,
        errs: Option<&mut Vec<Error>>,
    ) -> Result<(), ConstructError> {
        construct_tree(self, artifacts, options, errs)
    }
}
