//! Engine configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Behavior knobs attached to a [`Domain`](crate::Domain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecularConfig {
    /// Default `strict` flag for `config()`
    ///
    /// When strict, a node that already has children only accepts new keys
    /// through its template.
    pub strict: bool,
    /// Constructor rounds per node before a deadlock is reported
    pub max_construct_rounds: usize,
}

impl SpecularConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With strict config
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// With max constructor rounds
    #[inline]
    #[must_use]
    pub fn with_max_construct_rounds(mut self, rounds: usize) -> Self {
        self.max_construct_rounds = rounds;
        self
    }

    /// Load from a TOML document
    ///
    /// # Errors
    /// `invalid` when the document does not parse.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::invalid(format!("bad TOML config: {e}")))
    }

    /// Load from a JSON value
    ///
    /// # Errors
    /// `invalid` when the value does not match.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::invalid(format!("bad JSON config: {e}")))
    }
}

impl Default for SpecularConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_construct_rounds: 1024,
        }
    }
}
