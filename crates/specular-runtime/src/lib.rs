//! Specular Runtime
//!
//! Dataflow scheduling of processors over the namespace of a compiled
//! spec.
//!
//! # Core Concepts
//!
//! - [`Runtime`]: namespace of node values plus the scheduling state
//! - [`Processor`]: named work with declared read and write keys
//! - [`Process`]: the work itself, with optional cleanup on failure
//!
//! A processor is ready once every key it reads has been written.
//! [`Runtime::process`] runs ready processors until none is left;
//! [`Runtime::get_schedule`] computes the same order without running
//! anything.
//!
//! # Example
//!
//! ```rust,ignore
//! use specular::{json, Domain};
//! use specular_runtime::{Outputs, Processor, Runtime};
//!
//! let spec = Domain::new().compile_spec(&json!({"input": {}, "output": {}}))?;
//! let mut runtime = Runtime::new(spec);
//! runtime.add_processor(Processor::from_fn("double", ["input"], ["output"], |inputs| {
//!     let n = inputs["input"].as_ref().and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(Outputs::from([("output".to_string(), json!(n * 2))]))
//! })?)?;
//! runtime.process_all(Some(&json!({"input": 21})), None)?;
//! assert_eq!(runtime.get("output"), json!(42));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod graph;
mod processor;
mod runtime;

pub use processor::{Inputs, Outputs, Process, Processor};
pub use runtime::{Pending, Processed, Runtime};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
