//! Domain registries
//!
//! A [`Domain`] owns the schema registry (`$`) and the constructions
//! registry (`#`) shared by every spec compiled against it. Specs hold a
//! cheap handle to their domain instead of a back-pointer to a root node.

use crate::compile::{compile, config};
use crate::config::SpecularConfig;
use crate::construct::{Constructions, Constructor, ConstructorTable};
use crate::error::{Error, Result, What};
use crate::node::Node;
use crate::path::{Path, SCHEMATA};
use crate::source::{normalize_source, Source};
use crate::spec::Spec;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Clone)]
struct Registry {
    schemata: Node,
    constructions: Constructions,
    config: SpecularConfig,
}

/// Shared schema and constructions registry
///
/// Cloning a `Domain` yields another handle to the same registries; use
/// [`Domain::fork`] for an independent copy.
#[derive(Debug, Default, Clone)]
pub struct Domain {
    inner: Arc<RwLock<Registry>>,
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Domain {
    /// Create an empty domain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty domain with configuration
    #[must_use]
    pub fn with_config(config: SpecularConfig) -> Self {
        let domain = Self::new();
        domain.inner.write().config = config;
        domain
    }

    /// Independent deep copy of both registries
    #[must_use]
    pub fn fork(&self) -> Self {
        let registry = self.inner.read().clone();
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> SpecularConfig {
        self.inner.read().config.clone()
    }

    /// Replace the configuration
    pub fn set_config(&self, config: SpecularConfig) {
        self.inner.write().config = config;
    }

    /// Snapshot of the schema registry
    #[must_use]
    pub fn schemata(&self) -> Node {
        self.inner.read().schemata.clone()
    }

    /// Registered schema for a predicate key such as `.integer`
    ///
    /// Trailing `/` are ignored.
    #[must_use]
    pub fn schema(&self, key: &str) -> Option<Node> {
        let key = key.trim_end_matches('/');
        self.inner.read().schemata.child(key).cloned()
    }

    /// Whether a schema is registered under `key`
    #[must_use]
    pub fn has_schema(&self, key: &str) -> bool {
        let key = key.trim_end_matches('/');
        self.inner.read().schemata.child(key).is_some()
    }

    // The registry lock is not held while `f` runs, so `f` may read schemata.
    fn update_schemata<R>(&self, f: impl FnOnce(&mut Node) -> R) -> R {
        let mut schemata = self.schemata();
        let out = f(&mut schemata);
        self.inner.write().schemata = schemata;
        out
    }

    /// Merge a `$` source into the schema registry
    pub(crate) fn config_schemata(
        &self,
        source: Source,
        errs: &mut Vec<Error>,
    ) -> Result<BTreeSet<String>> {
        let loc = Path::single(SCHEMATA);
        let mut incoming = Node::new();
        let unknown = compile(&mut incoming, &loc, self, source, errs, false)?;
        self.update_schemata(|schemata| {
            config(schemata, &loc, self, &incoming, errs, true, false);
        });
        debug!(
            schemata = ?incoming.nodes().keys().collect::<Vec<_>>(),
            unknown = unknown.len(),
            "schemata configured"
        );
        Ok(unknown)
    }

    /// Compile a document into a new spec of this domain
    ///
    /// # Errors
    /// Normalization errors, or `compile-failed` carrying the collected errors.
    pub fn compile_spec(&self, doc: &Value) -> Result<Spec> {
        self.compile_spec_with(doc, false, false)
    }

    /// Compile a document, optionally registering `$`/`#` sections and
    /// requiring every predicate to have a schema
    ///
    /// # Errors
    /// As [`Domain::compile_spec`]; `unknown-predicates` when `complete` is
    /// set and some predicate has no registered schema.
    pub fn compile_spec_with(&self, doc: &Value, register: bool, complete: bool) -> Result<Spec> {
        let mut spec = Spec::with_domain(self.clone());
        let unknown = spec.compile_with(doc, None, register)?;
        if complete && !unknown.is_empty() {
            return Err(Error::new(What::UnknownPredicates)
                .with_message("predicates without registered schema")
                .with_data("predicates", unknown.into_iter().collect::<Vec<_>>()));
        }
        Ok(spec)
    }

    /// Register (or extend) the schema of `predicate`
    ///
    /// Returns the predicates referenced by the schema that are not yet
    /// registered.
    ///
    /// # Errors
    /// `compile-failed`, e.g. with `parent-predicate-not-found` when a
    /// multi-segment predicate is registered before its parent.
    pub fn compile_schema(&self, predicate: &str, doc: &Value) -> Result<BTreeSet<String>> {
        let mut errs = Vec::new();
        let unknown = self.compile_schema_into(predicate, doc, &mut errs)?;
        if !errs.is_empty() {
            debug!(predicate, errors = errs.len(), "schema compile failed");
            return Err(Error::aggregate(What::CompileFailed, errs)
                .with_message(format!("compiling schema {predicate:?} failed")));
        }
        Ok(unknown)
    }

    /// Register a schema, collecting errors into `errs`
    ///
    /// # Errors
    /// Only errors that abort compilation outright.
    pub fn compile_schema_into(
        &self,
        predicate: &str,
        doc: &Value,
        errs: &mut Vec<Error>,
    ) -> Result<BTreeSet<String>> {
        let segments: Vec<&str> = predicate.split('.').collect();
        for end in 2..segments.len() {
            let parent = segments[..end].join(".");
            if !self.has_schema(&parent) {
                errs.push(
                    Error::new(What::ParentPredicateNotFound)
                        .with_message(format!(
                            "parent {parent:?} of predicate {predicate:?} has not been registered"
                        ))
                        .at([SCHEMATA, predicate]),
                );
            }
        }

        let mut wrapped = Map::new();
        wrapped.insert(format!("{SCHEMATA}/{predicate}"), doc.clone());
        let source = normalize_source(&Value::Object(wrapped))?;
        let mut scratch = Node::new();
        let unknown = compile(&mut scratch, &Path::root(), self, source, errs, true)?;
        debug!(predicate, "schema registered");
        Ok(unknown)
    }

    /// Register several schemata in order
    ///
    /// # Errors
    /// `compile-failed` carrying every collected error.
    pub fn compile_schemata<'a, I>(&self, sources: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut errs = Vec::new();
        let mut unknown = BTreeSet::new();
        for (predicate, doc) in sources {
            unknown.extend(self.compile_schema_into(predicate, &doc, &mut errs)?);
        }
        if !errs.is_empty() {
            return Err(Error::aggregate(What::CompileFailed, errs));
        }
        Ok(unknown)
    }

    /// Configure an already registered schema in place
    ///
    /// Specs cloned from templates afterwards pick up the extension.
    ///
    /// # Errors
    /// `not-found` for an unknown schema, `config-failed` on merge errors.
    pub fn config_schema(&self, key: &str, doc: &Value) -> Result<()> {
        let key = key.trim_end_matches('/');
        if !self.has_schema(key) {
            return Err(Error::not_found(format!("no schema registered for {key:?}")));
        }

        let loc = Path::from([SCHEMATA, key]);
        let mut errs = Vec::new();
        let mut incoming = Node::new();
        compile(&mut incoming, &loc, self, normalize_source(doc)?, &mut errs, false)?;
        self.update_schemata(|schemata| {
            if let Some(schema) = schemata.nodes.get_mut(key) {
                config(schema, &loc, self, &incoming, &mut errs, true, false);
            }
        });

        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::aggregate(What::ConfigFailed, errs).at(loc))
        }
    }

    /// Snapshot of the constructions registry
    #[must_use]
    pub fn constructions(&self) -> Constructions {
        self.inner.read().constructions.clone()
    }

    /// Constructor table of one construction
    #[must_use]
    pub fn construction(&self, name: &str) -> Option<ConstructorTable> {
        self.inner.read().constructions.get(name).cloned()
    }

    /// Names of all constructions
    #[must_use]
    pub fn construction_names(&self) -> Vec<String> {
        self.inner.read().constructions.keys().cloned().collect()
    }

    /// Set the constructor table of a construction, returning the previous one
    pub fn add_construction(
        &self,
        name: impl Into<String>,
        table: ConstructorTable,
    ) -> Option<ConstructorTable> {
        self.inner.write().constructions.insert(name.into(), table)
    }

    /// Register one predicate's constructor within a construction
    ///
    /// The construction is created when missing.
    pub fn register_constructor(
        &self,
        construction: &str,
        predicate: impl Into<String>,
        constructor: Constructor,
    ) -> Option<Constructor> {
        self.inner
            .write()
            .constructions
            .entry(construction.to_string())
            .or_default()
            .insert(predicate.into(), constructor)
    }

    pub(crate) fn declare_construction(&self, name: &str) {
        self.inner
            .write()
            .constructions
            .entry(name.to_string())
            .or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fork_is_independent() {
        let domain = Domain::new();
        domain.compile_schema(".a", &json!({".a": {}})).unwrap();
        let forked = domain.fork();
        forked.compile_schema(".b", &json!({".b": {}})).unwrap();
        assert!(domain.has_schema(".a"));
        assert!(!domain.has_schema(".b"));
        assert!(forked.has_schema(".b"));
        assert_ne!(domain, forked);
        assert_eq!(domain, domain.clone());
    }

    #[test]
    fn schema_lookup_ignores_trailing_slash() {
        let domain = Domain::new();
        domain
            .compile_schema(".animal", &json!({".animal": {}, "feet": {}}))
            .unwrap();
        assert!(domain.schema(".animal/").is_some());
        assert!(domain.schema(".animal//").is_some());
        assert!(domain.schema(".plant").is_none());
    }

    #[test]
    fn parent_predicate_required() {
        let domain = Domain::new();
        let err = domain
            .compile_schema(".thing.property", &json!({".thing.property": {}}))
            .unwrap_err();
        assert_eq!(err.what, What::CompileFailed);
        assert_eq!(err.errs.len(), 1);
        assert_eq!(err.errs[0].what, What::ParentPredicateNotFound);
    }

    #[test]
    fn compile_schema_reports_unknown_predicates() {
        let domain = Domain::new();
        let unknown = domain
            .compile_schema(".paint", &json!({".paint": {}, ".colored": {}}))
            .unwrap();
        assert!(unknown.contains(".colored"));
    }

    #[test]
    fn complete_requires_known_predicates() {
        let domain = Domain::new();
        let err = domain
            .compile_spec_with(&json!({".ghost": {}}), false, true)
            .unwrap_err();
        assert_eq!(err.what, What::UnknownPredicates);
        assert_eq!(err.data["predicates"], json!([".ghost"]));
    }

    #[test]
    fn config_schema_requires_registration() {
        let domain = Domain::new();
        let err = domain.config_schema(".nope", &json!({"a": 1})).unwrap_err();
        assert_eq!(err.what, What::NotFound);
    }

    #[test]
    fn config_carries_through_fork() {
        let domain = Domain::with_config(SpecularConfig::new().with_strict(true));
        assert!(domain.fork().config().strict);
    }
}
