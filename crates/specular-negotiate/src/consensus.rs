//! Consensus map
//!
//! For every path, the distinct values asserted there. Each value keeps
//! the signer that first asserted it and the signers that agreed later.

use serde::Serialize;
use serde_json::Value;
use specular::Spec;
use std::collections::{BTreeMap, BTreeSet};

/// One value asserted at a path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assertion {
    /// Asserted value, `None` for a node without value
    pub value: Option<Value>,
    /// First signer to assert it, `None` for values of the base spec
    pub issuer: Option<String>,
    /// Signers asserting the same value after the issuer
    pub signers: BTreeSet<String>,
}

/// Asserted values per path key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Consensus(BTreeMap<String, Vec<Assertion>>);

impl Consensus {
    /// Create an empty consensus
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the concrete values of `spec`, issued by nobody
    ///
    /// Predicates and template values count as well.
    #[must_use]
    pub fn seed(spec: &Spec) -> Self {
        let mut consensus = Self::new();
        for (path, value) in spec.items() {
            if let Some(value) = value {
                consensus.0.insert(
                    path.to_key(),
                    vec![Assertion {
                        value: Some(value.clone()),
                        issuer: None,
                        signers: BTreeSet::new(),
                    }],
                );
            }
        }
        consensus
    }

    /// Record that `signer` asserts `value` at `path`
    pub fn record(&mut self, path: String, value: Option<Value>, signer: &str) {
        let assertions = self.0.entry(path).or_default();
        match assertions.iter_mut().find(|assertion| assertion.value == value) {
            Some(assertion) => {
                assertion.signers.insert(signer.to_string());
            }
            None => assertions.push(Assertion {
                value,
                issuer: Some(signer.to_string()),
                signers: BTreeSet::new(),
            }),
        }
    }

    /// Assertions at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[Assertion]> {
        self.0.get(path).map(Vec::as_slice)
    }

    /// Number of paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no path has assertions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths with their assertions, sorted by path key
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &[Assertion])> {
        self.0
            .iter()
            .map(|(path, assertions)| (path.as_str(), assertions.as_slice()))
    }
}
