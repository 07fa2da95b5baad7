//! Constructions
//!
//! A construction is a named family of constructors, one per predicate.
//! [`Spec::construct`](crate::Spec::construct) walks the spec tree
//! post-order and, at every node carrying predicates, runs the matching
//! constructors in rounds until each has produced an output, skipped, or
//! failed. Outputs are collected into [`Artifacts`] keyed by construction
//! and node location.
//!
//! # Core Concepts
//!
//! - [`Constructor`]: a function plus the [`Field`]s of the [`Context`] it reads
//! - [`Interrupt`]: control flow out of a constructor (defer, skip, fail)
//! - [`Artifacts`]: outputs and skipped predicates per construction

mod base;
mod constructor;
mod context;
mod engine;

pub use base::{base_constructors, BASE};
pub use constructor::{
    construct_after, construct_last, construct_skip_no_value, Constructor, ConstructorFn, Field,
    FieldSet, Interrupt,
};
pub use context::Context;
pub use engine::{ConstructError, ConstructOptions};

pub(crate) use engine::construct_tree;

use crate::path::{IntoPath, Path};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Constructors of one construction keyed by predicate (`.integer`)
pub type ConstructorTable = BTreeMap<String, Constructor>;

/// Every construction of a domain keyed by name
pub type Constructions = BTreeMap<String, ConstructorTable>;

/// Outputs of constructions keyed by node location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    outputs: BTreeMap<String, BTreeMap<Path, Value>>,
    skipped: BTreeMap<String, BTreeMap<Path, BTreeSet<String>>>,
}

impl Artifacts {
    /// Create empty artifacts
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of `construction` at `loc`
    #[must_use]
    pub fn get(&self, construction: &str, loc: impl IntoPath) -> Option<&Value> {
        self.outputs.get(construction)?.get(&loc.into_path())
    }

    /// Store an output, returning the previous one
    pub fn insert(&mut self, construction: &str, loc: impl IntoPath, value: Value) -> Option<Value> {
        self.outputs
            .entry(construction.to_string())
            .or_default()
            .insert(loc.into_path(), value)
    }

    /// Whether `construction` has run on at least one node with predicates
    #[must_use]
    pub fn contains(&self, construction: &str) -> bool {
        self.outputs.contains_key(construction)
    }

    /// All outputs of one construction
    #[must_use]
    pub fn construction(&self, construction: &str) -> Option<&BTreeMap<Path, Value>> {
        self.outputs.get(construction)
    }

    /// Names of constructions with outputs
    pub fn constructions(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    /// Predicates skipped by `construction` at `loc`
    #[must_use]
    pub fn skipped(&self, construction: &str, loc: impl IntoPath) -> Option<&BTreeSet<String>> {
        self.skipped.get(construction)?.get(&loc.into_path())
    }

    /// Every node where `construction` skipped predicates
    #[must_use]
    pub fn skipped_in(&self, construction: &str) -> Option<&BTreeMap<Path, BTreeSet<String>>> {
        self.skipped.get(construction)
    }

    pub(crate) fn declare(&mut self, construction: &str) {
        self.outputs.entry(construction.to_string()).or_default();
    }

    pub(crate) fn record_skipped(&mut self, construction: &str, loc: Path, skipped: BTreeSet<String>) {
        self.skipped
            .entry(construction.to_string())
            .or_default()
            .insert(loc, skipped);
    }
}
