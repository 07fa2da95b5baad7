//! Specular
//!
//! Specify, configure and construct objects from documents.
//!
//! A document is compiled into a [`Spec`]: a tree of nodes, each holding an
//! optional value, named children, reusable predicates (`.`) and a template
//! for not-yet-seen children (`?`). Predicates are defined once as schemata
//! in a [`Domain`] and merged into every node that names them. Further
//! documents are merged with [`Spec::config`], which detects conflicts
//! instead of overwriting. Finally [`Spec::construct`] runs the domain's
//! constructions over the tree to build artifacts.
//!
//! # Core Concepts
//!
//! - [`Spec`] / [`Node`]: the compiled tree and its nodes
//! - [`Domain`]: shared schema and constructions registries
//! - [`Path`] and [`key_to_path`]: addressing, with `one.two` / `a?b` key splitting
//! - [`Constructor`] / [`Artifacts`]: per-predicate construction and its outputs
//! - [`Settings`]: `:`-prefixed values inherited down the tree
//! - [`Error`]: one structured error tagged with [`What`]
//!
//! # Example
//!
//! ```rust,ignore
//! use specular::{json, Domain};
//!
//! let domain = Domain::base()?;
//! let mut spec = domain.compile_spec(&json!({
//!     "alpha": {".integer": {"min": 3, "max": 4}},
//! }))?;
//! spec.config(&json!({"alpha": 3}))?;
//!
//! let artifacts = spec.construct()?;
//! assert_eq!(artifacts.get("base", "alpha"), Some(&json!(3)));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod compile;
pub mod config;
pub mod construct;
pub mod domain;
pub mod error;
pub mod node;
pub mod path;
pub mod settings;
pub mod source;
pub mod spec;
pub mod value;
pub mod walk;

// Re-exports
pub use compile::predicate_key;
pub use config::SpecularConfig;
pub use construct::{
    base_constructors, construct_after, construct_last, construct_skip_no_value, Artifacts,
    ConstructError, ConstructOptions, Constructions, Constructor, ConstructorTable, Context, Field,
    FieldSet, Interrupt, BASE,
};
pub use domain::Domain;
pub use error::{Error, Result, What};
pub use node::Node;
pub use path::{is_reserved, key_to_path, path_to_key, IntoPath, Path};
pub use settings::{extract_settings, Setting, Settings};
pub use source::{merge_source, normalize_source, Source};
pub use spec::{ConfigMode, Spec};
pub use value::{truthy, Data, Lookup};
pub use walk::{Order, Visit, Walk};

pub use serde_json::{json, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
