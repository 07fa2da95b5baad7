//! Error types for specular
//!
//! A single structured [`Error`] is raised by every engine operation. It
//! carries a machine-readable [`What`] tag, a message, the spec location,
//! the call site that raised it, nested errors collected by batch
//! operations, and free-form data.

use crate::path::Path;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::panic::Location;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Machine-readable error tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum What {
    /// Malformed input or constructor data
    Invalid,
    /// Entry already present
    Already,
    /// Key or registry entry missing
    NotFound,
    /// Conflicting values while normalizing a document
    CannotNormalize,
    /// Concrete value differs from the incoming one
    ValueMismatch,
    /// Value cannot be set on an immutable node
    ImmutableValue,
    /// Key cannot be added to an immutable node
    ImmutableKey,
    /// New key on a node without a usable template
    NoTemplate,
    /// Aggregate failure of `config`
    ConfigFailed,
    /// Aggregate failure of `compile`
    CompileFailed,
    /// Aggregate failure of a standalone clone
    CloneFailed,
    /// Aggregate failure of `construct`
    ConstructionFailed,
    /// `$` found while compiling without registration
    SchemataConfigNotAllowed,
    /// `#` found while compiling without registration
    ConstructionsConfigNotAllowed,
    /// Multi-segment predicate registered before its parent
    ParentPredicateNotFound,
    /// Template predicates unresolved when cloning
    TemplatePredicatesUnknown,
    /// Predicates unresolved where completeness was requested
    UnknownPredicates,
    /// Requested behavior not supported
    Unsupported,
    /// Errors raised while running processors
    ProcessError,
    /// Processors left waiting on unsatisfied reads
    ProcessPending,
    /// Processors returned undeclared outputs
    ProcessUnknownKeys,
    /// Processor reads a key outside the namespace
    NoReadKey,
    /// Processor writes a key outside the namespace
    NoWriteKey,
    /// Host-defined tag
    Other(String),
}

impl What {
    /// Kebab-case tag string
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Invalid => "invalid",
            Self::Already => "already",
            Self::NotFound => "not-found",
            Self::CannotNormalize => "cannot-normalize",
            Self::ValueMismatch => "value-mismatch",
            Self::ImmutableValue => "immutable-value",
            Self::ImmutableKey => "immutable-key",
            Self::NoTemplate => "no-template",
            Self::ConfigFailed => "config-failed",
            Self::CompileFailed => "compile-failed",
            Self::CloneFailed => "clone-failed",
            Self::ConstructionFailed => "construction-failed",
            Self::SchemataConfigNotAllowed => "schemata-config-not-allowed",
            Self::ConstructionsConfigNotAllowed => "constructions-config-not-allowed",
            Self::ParentPredicateNotFound => "parent-predicate-not-found",
            Self::TemplatePredicatesUnknown => "template-predicates-unknown",
            Self::UnknownPredicates => "unknown-predicates",
            Self::Unsupported => "unsupported",
            Self::ProcessError => "process-error",
            Self::ProcessPending => "process-pending",
            Self::ProcessUnknownKeys => "process-unknown-keys",
            Self::NoReadKey => "no-read-key",
            Self::NoWriteKey => "no-write-key",
            Self::Other(tag) => tag,
        }
    }
}

impl Display for What {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for What {
    fn from(tag: &str) -> Self {
        match tag {
            "invalid" => Self::Invalid,
            "already" => Self::Already,
            "not-found" => Self::NotFound,
            "cannot-normalize" => Self::CannotNormalize,
            "value-mismatch" => Self::ValueMismatch,
            "immutable-value" => Self::ImmutableValue,
            "immutable-key" => Self::ImmutableKey,
            "no-template" => Self::NoTemplate,
            "config-failed" => Self::ConfigFailed,
            "compile-failed" => Self::CompileFailed,
            "clone-failed" => Self::CloneFailed,
            "construction-failed" => Self::ConstructionFailed,
            "schemata-config-not-allowed" => Self::SchemataConfigNotAllowed,
            "constructions-config-not-allowed" => Self::ConstructionsConfigNotAllowed,
            "parent-predicate-not-found" => Self::ParentPredicateNotFound,
            "template-predicates-unknown" => Self::TemplatePredicatesUnknown,
            "unknown-predicates" => Self::UnknownPredicates,
            "unsupported" => Self::Unsupported,
            "process-error" => Self::ProcessError,
            "process-pending" => Self::ProcessPending,
            "process-unknown-keys" => Self::ProcessUnknownKeys,
            "no-read-key" => Self::NoReadKey,
            "no-write-key" => Self::NoWriteKey,
            other => Self::Other(other.to_string()),
        }
    }
}

impl PartialEq<&str> for What {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Structured engine error
#[derive(Debug, Clone, thiserror::Error)]
#[error("{what} at '{loc}': {message}")]
pub struct Error {
    /// Machine-readable tag
    pub what: What,
    /// Human-readable message
    pub message: String,
    /// Spec location the error refers to
    pub loc: Path,
    /// Source location that raised the error
    pub codeloc: &'static Location<'static>,
    /// Errors collected by a batch operation
    pub errs: Vec<Error>,
    /// Additional named data
    pub data: Map<String, Value>,
}

impl Error {
    /// Create a new error, capturing the caller as code location
    #[track_caller]
    #[must_use]
    pub fn new(what: impl Into<What>) -> Self {
        Self {
            what: what.into(),
            message: String::new(),
            loc: Path::root(),
            codeloc: Location::caller(),
            errs: Vec::new(),
            data: Map::new(),
        }
    }

    /// Invalid input
    #[track_caller]
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(What::Invalid).with_message(message)
    }

    /// Missing key or entry
    #[track_caller]
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(What::NotFound).with_message(message)
    }

    /// Aggregate over collected errors
    #[track_caller]
    #[must_use]
    pub fn aggregate(what: What, errs: Vec<Error>) -> Self {
        Self::new(what).with_errs(errs)
    }

    /// With message
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// With spec location
    #[inline]
    #[must_use]
    pub fn at(mut self, loc: impl Into<Path>) -> Self {
        self.loc = loc.into();
        self
    }

    /// With nested errors
    #[inline]
    #[must_use]
    pub fn with_errs(mut self, errs: Vec<Error>) -> Self {
        self.errs = errs;
        self
    }

    /// With a named data entry
    #[inline]
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Code location rendered as `file:line:column`
    #[must_use]
    pub fn code(&self) -> String {
        format!(
            "{}:{}:{}",
            self.codeloc.file(),
            self.codeloc.line(),
            self.codeloc.column()
        )
    }

    /// Structured dump of the error and its nested errors
    ///
    /// Data entries are merged at the top level next to `Code`, `Errors`,
    /// `Location`, `Message` and `What`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = self.data.clone();
        out.insert("Code".into(), Value::String(self.code()));
        out.insert(
            "Errors".into(),
            Value::Array(self.errs.iter().map(Error::to_json).collect()),
        );
        out.insert(
            "Location".into(),
            Value::Array(self.loc.iter().map(|s| Value::String(s.into())).collect()),
        );
        out.insert("Message".into(), Value::String(self.message.clone()));
        out.insert("What".into(), Value::String(self.what.to_string()));
        Value::Object(out)
    }
}
