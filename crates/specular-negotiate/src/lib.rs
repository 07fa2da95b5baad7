//! Specular Negotiate
//!
//! Consensus analysis for several signers contributing partial
//! documents to one shared spec.
//!
//! # Core Concepts
//!
//! - [`Consensus`]: the distinct values asserted per path, with issuer
//!   and agreeing signers
//! - [`Ack`]: `ACK` when our signer agrees, `NOACK` otherwise, `CONFLICT`
//!   when signers disagree
//! - [`Analysis`]: validity and compatibility of every position plus
//!   path and node statuses
//!
//! # Example
//!
//! ```rust,ignore
//! use specular::{json, Domain};
//! use specular_negotiate::{negotiate, Ack};
//!
//! let spec = Domain::new().compile_spec(&json!({"host": {}}))?;
//! let positions = vec![("alice".to_string(), json!({"host": "alice"}))];
//! let analysis = negotiate(&spec, &positions, Some("bob"), Some(&json!({"host": "alice"})))?;
//! assert_eq!(analysis.path_statuses["host"].ack, Ack::NoAck);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod analysis;
mod consensus;
mod negotiate;

pub use analysis::{analyze, compare, Ack, NodeStatus, PathStatus, StatusChange, Statuses};
pub use consensus::{Assertion, Consensus};
pub use negotiate::{negotiate, Analysis, ErrorPaths};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
