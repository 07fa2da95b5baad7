//! Processors
//!
//! A [`Processor`] is a named unit of work declaring the namespace keys it
//! reads and writes. The work itself is a [`Process`] implementation.

use specular::{Error, Result, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Values of a processor's read keys, `None` for keys without a value
pub type Inputs = BTreeMap<String, Option<Value>>;

/// Values produced by a processor, keyed by namespace key
///
/// Entries for declared write keys are stored in the namespace and
/// consumed. Whatever remains is reported back to the caller.
pub type Outputs = BTreeMap<String, Value>;

/// Work performed by a processor
pub trait Process: Send + Sync {
    /// Run with the current values of the read keys
    ///
    /// # Errors
    /// Any error aborts the run and triggers cleanup of every processor
    /// that already ran.
    fn process(&self, inputs: &Inputs) -> Result<Outputs>;

    /// Compensate after the processor named `failed` raised `error`
    ///
    /// Outputs for declared write keys are stored; nothing is consumed or
    /// registered as written.
    ///
    /// # Errors
    /// Collected next to the original error.
    fn cleanup(&self, failed: &str, error: &Error, inputs: &Inputs) -> Result<Outputs> {
        let _ = (failed, error, inputs);
        Ok(Outputs::new())
    }
}

struct FnProcess<F>(F);

impl<F> Process for FnProcess<F>
where
    F: Fn(&Inputs) -> Result<Outputs> + Send + Sync,
{
    fn process(&self, inputs: &Inputs) -> Result<Outputs> {
        (self.0)(inputs)
    }
}

/// Named unit of work with declared read and write keys
#[derive(Clone)]
pub struct Processor {
    name: String,
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    work: Arc<dyn Process>,
}

impl Debug for Processor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Create a processor running `work`
    ///
    /// # Errors
    /// `invalid` when the name or any key is empty.
    pub fn new<R, W, P>(name: impl Into<String>, reads: R, writes: W, work: P) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
        P: Process + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid("processor name is empty"));
        }
        let reads: BTreeSet<String> = reads.into_iter().map(Into::into).collect();
        let writes: BTreeSet<String> = writes.into_iter().map(Into::into).collect();
        if reads.iter().chain(&writes).any(String::is_empty) {
            return Err(Error::invalid(format!("{name:?}: empty read or write key"))
                .with_data("processor", name));
        }
        Ok(Self {
            name,
            reads,
            writes,
            work: Arc::new(work),
        })
    }

    /// Create a processor from a closure, without cleanup
    ///
    /// # Errors
    /// As [`Processor::new`].
    pub fn from_fn<R, W, F>(name: impl Into<String>, reads: R, writes: W, func: F) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
        F: Fn(&Inputs) -> Result<Outputs> + Send + Sync + 'static,
    {
        Self::new(name, reads, writes, FnProcess(func))
    }

    /// Processor name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys read
    #[inline]
    #[must_use]
    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }

    /// Keys written
    #[inline]
    #[must_use]
    pub fn writes(&self) -> &BTreeSet<String> {
        &self.writes
    }

    pub(crate) fn process(&self, inputs: &Inputs) -> Result<Outputs> {
        self.work.process(inputs)
    }

    pub(crate) fn cleanup(&self, failed: &str, error: &Error, inputs: &Inputs) -> Result<Outputs> {
        self.work.cleanup(failed, error, inputs)
    }
}
