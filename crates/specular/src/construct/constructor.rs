//! Constructor registration and control flow

use super::context::Context;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Fields a constructor may read from its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Node being constructed
    Spec,
    /// Location of the node
    Loc,
    /// Root node of the spec
    TopSpec,
    /// Every construction in use
    Constructions,
    /// Name of the running construction
    Construction,
    /// Constructor table of the running construction
    Constructors,
    /// Node value
    Value,
    /// Current output of the running construction at this node
    Output,
    /// Outputs of the running construction
    Artifacts,
    /// Outputs of every construction
    GlobalArtifacts,
    /// Settings in effect at this node
    Settings,
    /// Predicate keys of the node in construction order
    Dependencies,
    /// Schema registry snapshot
    Schemata,
    /// Predicates constructed so far at this node
    Constructed,
    /// Predicates skipped so far at this node
    Skipped,
    /// Current round, starting at 0
    Round,
    /// Errors collected so far
    Errs,
    /// Predicate being constructed
    Predicate,
    /// Arguments given under the predicate
    Args,
    /// The whole context
    Context,
}

impl Field {
    /// Every field in declaration order
    pub const ALL: [Field; 20] = [
        Self::Spec,
        Self::Loc,
        Self::TopSpec,
        Self::Constructions,
        Self::Construction,
        Self::Constructors,
        Self::Value,
        Self::Output,
        Self::Artifacts,
        Self::GlobalArtifacts,
        Self::Settings,
        Self::Dependencies,
        Self::Schemata,
        Self::Constructed,
        Self::Skipped,
        Self::Round,
        Self::Errs,
        Self::Predicate,
        Self::Args,
        Self::Context,
    ];

    /// Field name as used at registration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Loc => "loc",
            Self::TopSpec => "top_spec",
            Self::Constructions => "constructions",
            Self::Construction => "construction",
            Self::Constructors => "constructors",
            Self::Value => "value",
            Self::Output => "output",
            Self::Artifacts => "artifacts",
            Self::GlobalArtifacts => "global_artifacts",
            Self::Settings => "settings",
            Self::Dependencies => "dependencies",
            Self::Schemata => "schemata",
            Self::Constructed => "constructed",
            Self::Skipped => "skipped",
            Self::Round => "round",
            Self::Errs => "errs",
            Self::Predicate => "predicate",
            Self::Args => "args",
            Self::Context => "context",
        }
    }

    /// Look up a field by name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of granted context fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet(u32);

impl FieldSet {
    /// Every field
    #[must_use]
    pub fn all() -> Self {
        Field::ALL.into_iter().collect()
    }

    /// Whether `field` is granted
    ///
    /// Granting [`Field::Context`] grants everything.
    #[inline]
    #[must_use]
    pub fn contains(self, field: Field) -> bool {
        self.0 & (field.bit() | Field::Context.bit()) != 0
    }

    /// Grant `field`
    #[inline]
    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    /// Granted fields in declaration order
    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL
            .into_iter()
            .filter(move |field| self.0 & field.bit() != 0)
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut set = Self::default();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

/// Signal returned by a constructor instead of an output
#[derive(Debug, thiserror::Error)]
pub enum Interrupt {
    /// Retry in a later round
    #[error("constructor deferred")]
    Defer,
    /// Give up on this predicate for this node without error
    #[error("constructor skipped")]
    Skip,
    /// Record the error and abandon this predicate for this node
    #[error(transparent)]
    Fail(#[from] Error),
}

/// Constructor function signature
pub type ConstructorFn = dyn Fn(&Context<'_>) -> Result<Value, Interrupt> + Send + Sync;

/// A named constructor with the context fields it reads
#[derive(Clone)]
pub struct Constructor {
    name: String,
    fields: FieldSet,
    func: Arc<ConstructorFn>,
}

impl Debug for Constructor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Constructor {
    /// Register `func` reading the named context fields
    ///
    /// # Errors
    /// `invalid` when a name is not a context field.
    pub fn new<F>(name: impl Into<String>, fields: &[&str], func: F) -> Result<Self>
    where
        F: Fn(&Context<'_>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        let name = name.into();
        let unknown: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|field| Field::from_name(field).is_none())
            .collect();
        if !unknown.is_empty() {
            let available: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
            return Err(Error::invalid(format!(
                "{name:?}: unknown constructor arguments: {unknown:?}. \
                 the available context fields are {available:?}."
            )));
        }
        let fields = fields.iter().filter_map(|field| Field::from_name(field));
        Ok(Self::with_fields(name, fields, func))
    }

    /// Register `func` reading the given fields
    pub fn with_fields<F>(name: impl Into<String>, fields: impl IntoIterator<Item = Field>, func: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
            func: Arc::new(func),
        }
    }

    /// Register `func` with access to the whole context
    pub fn with_context<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        Self::with_fields(name, [Field::Context], func)
    }

    /// Constructor name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Granted fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> FieldSet {
        self.fields
    }

    /// Run against `context`, restricted to the granted fields
    ///
    /// # Errors
    /// Whatever the constructor returns.
    pub fn call(&self, context: &Context<'_>) -> Result<Value, Interrupt> {
        (self.func)(&context.restrict(self.fields, &self.name))
    }
}

/// Defer until every one of `predicates` is constructed or skipped
///
/// # Errors
/// [`Interrupt::Defer`] while some are pending; `invalid` if the
/// constructor did not request `constructed` and `skipped`.
pub fn construct_after(context: &Context<'_>, predicates: &[&str]) -> Result<(), Interrupt> {
    let constructed = context.constructed()?;
    let skipped = context.skipped()?;
    let done = predicates
        .iter()
        .all(|predicate| constructed.contains(*predicate) || skipped.contains(*predicate));
    if done {
        Ok(())
    } else {
        Err(Interrupt::Defer)
    }
}

/// Defer until every other predicate of the node is constructed or skipped
///
/// # Errors
/// [`Interrupt::Defer`] while others are pending; `invalid` if the
/// constructor did not request the needed fields.
pub fn construct_last(context: &Context<'_>) -> Result<(), Interrupt> {
    let processed = context.constructed()?.len() + context.skipped()?.len();
    if processed + 1 < context.dependencies()?.len() {
        Err(Interrupt::Defer)
    } else {
        Ok(())
    }
}

/// The node value, or [`Interrupt::Skip`] when there is none
///
/// # Errors
/// [`Interrupt::Skip`] on `None`.
pub fn construct_skip_no_value(value: Option<&Value>) -> Result<&Value, Interrupt> {
    value.ok_or(Interrupt::Skip)
}
