//! Runtime namespace and scheduler
//!
//! The namespace maps the key of every regular node of a spec to its
//! current value. Processors become ready once every key they read has
//! been written; writes by a processor are registered as they happen and
//! may ready further processors.

use crate::processor::{Inputs, Outputs, Processor};
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Map, Value};
use specular::path::VALUE;
use specular::{key_to_path, Error, IntoPath, Lookup, Node, Path, Result, Spec, Walk, What};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

/// Remaining read keys of each processor still waiting on input
pub type Pending = IndexMap<String, BTreeSet<String>>;

/// Outcome of [`Runtime::process`]
#[derive(Debug, Default)]
pub struct Processed {
    /// Each processor that ran with its unconsumed outputs, in run order
    pub results: Vec<(String, Outputs)>,
    /// Processors whose reads were never satisfied
    pub pending: Pending,
    /// The processing error followed by any cleanup errors
    pub errs: Vec<Error>,
}

impl Processed {
    /// Names of the processors that ran, in order
    #[must_use]
    pub fn schedule(&self) -> Vec<String> {
        self.results.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Namespace of a spec plus the processors scheduled over it
#[derive(Debug)]
pub struct Runtime {
    spec: Spec,
    initial: IndexMap<String, Option<Value>>,
    namespace: IndexMap<String, Option<Value>>,
    processors: IndexMap<String, Processor>,
    reader_index: IndexMap<String, IndexSet<String>>,
    writer_index: IndexMap<String, IndexSet<String>>,
    pending: Pending,
    waiting: Vec<String>,
    processed: Vec<String>,
}

impl Runtime {
    /// Create a runtime whose namespace holds every regular node of `spec`
    #[must_use]
    pub fn new(spec: Spec) -> Self {
        let initial: IndexMap<String, Option<Value>> = Walk::preorder()
            .collect(spec.root())
            .into_iter()
            .map(|(path, node)| (path.to_key(), node.value().cloned()))
            .collect();
        Self {
            spec,
            namespace: initial.clone(),
            initial,
            processors: IndexMap::new(),
            reader_index: IndexMap::new(),
            writer_index: IndexMap::new(),
            pending: Pending::new(),
            waiting: Vec::new(),
            processed: Vec::new(),
        }
    }

    /// The spec the namespace was built from
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Current value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Lookup<'_> {
        match self.namespace.get(key) {
            None => Lookup::NotFound,
            Some(value) => Lookup::from_value(value.as_ref()),
        }
    }

    /// Whether `key` is in the namespace
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.namespace.contains_key(key)
    }

    /// Number of namespace keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespace.len()
    }

    /// Whether the namespace is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Namespace keys in spec pre-order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.namespace.keys().map(String::as_str)
    }

    /// Namespace values in spec pre-order
    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.namespace.values().map(Option::as_ref)
    }

    /// Namespace entries in spec pre-order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.namespace
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    /// Set the value of an existing key
    ///
    /// # Errors
    /// `not-found` when `key` is not in the namespace.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        match self.namespace.get_mut(key) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(Error::not_found(format!("{key:?}: key not in namespace"))
                .with_data("key", key)),
        }
    }

    /// Set a value and register the write
    ///
    /// # Errors
    /// As [`Runtime::set`].
    pub fn write(&mut self, key: &str, value: Value, writer: Option<&str>) -> Result<()> {
        self.set(key, value)?;
        self.register_write(key, writer);
        Ok(())
    }

    /// Record that `key` was written, by `writer` if given
    ///
    /// A processor reading `key` is credited once no other declared writer
    /// of `key` is left to run, or right away when it writes `key` itself.
    /// A processor whose reads are all credited becomes ready.
    pub fn register_write(&mut self, key: &str, writer: Option<&str>) {
        let writers = match self.writer_index.get_mut(key) {
            Some(writers) => {
                if let Some(writer) = writer {
                    writers.shift_remove(writer);
                }
                let remaining = writers.clone();
                if writers.is_empty() {
                    self.writer_index.shift_remove(key);
                }
                remaining
            }
            None => IndexSet::new(),
        };
        trace!(key, ?writer, remaining = writers.len(), "write registered");

        let Some(readers) = self.reader_index.get_mut(key) else {
            return;
        };

        let mut ready = Vec::new();
        for reader in readers.iter() {
            let Some(deps) = self.pending.get_mut(reader) else {
                continue;
            };
            if !writers.is_empty() && !writers.contains(reader) {
                continue;
            }
            deps.remove(key);
            if deps.is_empty() {
                ready.push(reader.clone());
            }
        }

        for reader in ready {
            readers.shift_remove(&reader);
            self.pending.shift_remove(&reader);
            debug!(processor = %reader, key, "processor ready");
            self.waiting.push(reader);
        }

        if readers.is_empty() {
            self.reader_index.shift_remove(key);
        }
    }

    /// Read keys of pending processors that no processor writes
    #[must_use]
    pub fn get_input_keys(&self) -> Vec<String> {
        let keys: IndexSet<&String> = self
            .pending
            .values()
            .flatten()
            .filter(|key| !self.writer_index.contains_key(key.as_str()))
            .collect();
        keys.into_iter().cloned().collect()
    }

    /// Rebuild the scheduling state from the registered processors
    pub fn reset_processors(&mut self) {
        self.reader_index.clear();
        self.writer_index.clear();
        self.pending.clear();
        self.waiting.clear();
        self.processed.clear();

        let processors: Vec<Processor> = self.processors.values().cloned().collect();
        for processor in &processors {
            self.index(processor);
        }
    }

    /// Restore the namespace to the spec's values
    pub fn reset_data(&mut self) {
        self.namespace = self.initial.clone();
    }

    /// Reset both namespace and scheduling state
    pub fn reset(&mut self) {
        self.reset_data();
        self.reset_processors();
    }

    /// Values of the direct children of `key`
    ///
    /// A childless node yields its own value under `""`, a node without
    /// value or children yields nothing.
    ///
    /// # Errors
    /// `not-found` when `key` is not a spec node.
    pub fn getlevel(&self, key: &str) -> Result<BTreeMap<String, Option<Value>>> {
        let path = key_to_path(key);
        let node = self.node(key, &path)?;
        let mut out = BTreeMap::new();
        if node.is_empty() {
            if node.value().is_some() {
                out.insert(String::new(), self.value_at(&path));
            }
            return Ok(out);
        }
        for (segment, _) in node.iter_level_values() {
            out.insert(segment.to_string(), self.value_at(&path.child(segment)));
        }
        Ok(out)
    }

    /// Values of every node below `key`, keyed relative to it
    ///
    /// # Errors
    /// `not-found` when `key` is not a spec node.
    pub fn getpath(&self, key: &str) -> Result<BTreeMap<String, Option<Value>>> {
        let path = key_to_path(key);
        let node = self.node(key, &path)?;
        let mut out = BTreeMap::new();
        if node.is_empty() {
            if node.value().is_some() {
                out.insert(String::new(), self.value_at(&path));
            }
            return Ok(out);
        }
        for (subpath, _) in Walk::preorder().collect(node) {
            out.insert(subpath.to_key(), self.value_at(&path.concat(&subpath)));
        }
        Ok(out)
    }

    fn node(&self, key: &str, path: &Path) -> Result<&Node> {
        self.spec
            .getpath(path)
            .ok_or_else(|| Error::not_found(format!("{key:?}: key not found")).at(path.clone()))
    }

    fn value_at(&self, path: &Path) -> Option<Value> {
        self.namespace.get(&path.to_key()).cloned().flatten()
    }

    /// Write every value of `doc` below `path`, without registering
    ///
    /// # Errors
    /// `not-found` for a key outside the namespace.
    pub fn insert(&mut self, doc: &Value, path: impl IntoPath) -> Result<()> {
        self.insert_doc(doc, &path.into_path(), None)
    }

    /// Write every value of `doc` below `path` and register each write
    ///
    /// # Errors
    /// `not-found` for a key outside the namespace.
    pub fn insert_as(&mut self, doc: &Value, path: impl IntoPath, writer: Option<&str>) -> Result<()> {
        self.insert_doc(doc, &path.into_path(), Some(writer))
    }

    fn insert_doc(&mut self, doc: &Value, path: &Path, register: Option<Option<&str>>) -> Result<()> {
        let Value::Object(map) = doc else {
            return Err(Error::invalid("inserted document is not a mapping").at(path.clone()));
        };

        for (key, value) in map {
            if key == VALUE {
                continue;
            }
            let subpath = path.child(key.as_str());
            if value.is_object() {
                self.insert_doc(value, &subpath, register)?;
            } else {
                self.store(&subpath.to_key(), value.clone(), register)?;
            }
        }

        if let Some(value) = map.get(VALUE) {
            self.store(&path.to_key(), value.clone(), register)?;
        }
        Ok(())
    }

    fn store(&mut self, key: &str, value: Value, register: Option<Option<&str>>) -> Result<()> {
        self.set(key, value)?;
        if let Some(writer) = register {
            self.register_write(key, writer);
        }
        Ok(())
    }

    /// Register a processor
    ///
    /// # Errors
    /// - `already` when a processor with the same name exists
    /// - `no-read-key` / `no-write-key` when a key is not in the namespace
    pub fn add_processor(&mut self, processor: Processor) -> Result<()> {
        let name = processor.name();
        if self.processors.contains_key(name) {
            return Err(Error::new(What::Already)
                .with_message(format!("{name}: processor already exists")));
        }
        if let Some(key) = processor.reads().iter().find(|key| !self.contains(key)) {
            return Err(Error::new(What::NoReadKey)
                .with_message(format!("{key:?}: read key not in namespace"))
                .with_data("key", key.as_str()));
        }
        if let Some(key) = processor.writes().iter().find(|key| !self.contains(key)) {
            return Err(Error::new(What::NoWriteKey)
                .with_message(format!("{key:?}: write key not in namespace"))
                .with_data("key", key.as_str()));
        }

        debug!(
            processor = name,
            reads = processor.reads().len(),
            writes = processor.writes().len(),
            "processor added"
        );
        self.index(&processor);
        self.processors.insert(name.to_string(), processor);
        Ok(())
    }

    fn index(&mut self, processor: &Processor) {
        let name = processor.name();
        if processor.reads().is_empty() {
            self.waiting.push(name.to_string());
        } else {
            self.pending.insert(name.to_string(), processor.reads().clone());
            for key in processor.reads() {
                self.reader_index
                    .entry(key.clone())
                    .or_default()
                    .insert(name.to_string());
            }
        }
        for key in processor.writes() {
            self.writer_index
                .entry(key.clone())
                .or_default()
                .insert(name.to_string());
        }
    }

    /// Registered processors in insertion order
    pub fn processors(&self) -> impl Iterator<Item = &Processor> {
        self.processors.values()
    }

    /// Processors waiting on `key`
    #[must_use]
    pub fn readers_of(&self, key: &str) -> Vec<&str> {
        self.reader_index
            .get(key)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Processors still expected to write `key`
    #[must_use]
    pub fn writers_of(&self, key: &str) -> Vec<&str> {
        self.writer_index
            .get(key)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Processors waiting on input
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &Pending {
        &self.pending
    }

    /// Processors ready to run
    #[inline]
    #[must_use]
    pub fn waiting(&self) -> &[String] {
        &self.waiting
    }

    /// Processors started since the last reset, in order
    #[inline]
    #[must_use]
    pub fn processed(&self) -> &[String] {
        &self.processed
    }

    /// Run order and pending set, without running any processor
    ///
    /// Keys read but never written count as already written. Scheduling
    /// state is reset afterwards; namespace values are untouched.
    pub fn get_schedule(&mut self) -> (Vec<String>, Pending) {
        self.reset_processors();
        for key in self.get_input_keys() {
            self.register_write(&key, None);
        }
        let processed = self.run(true);
        self.reset_processors();
        (processed.schedule(), processed.pending)
    }

    /// Seed the namespace and run ready processors until none is left
    ///
    /// `initdata` maps namespace keys to values; `docdata` is a document
    /// inserted from the root. Both are registered as written by no
    /// particular processor. A processor error stops the run; every
    /// processor started so far is then cleaned up in reverse order.
    ///
    /// # Errors
    /// `invalid` or `not-found` for bad seed data. Processor errors are
    /// reported in [`Processed::errs`].
    pub fn process(&mut self, initdata: Option<&Value>, docdata: Option<&Value>) -> Result<Processed> {
        if let Some(initdata) = initdata {
            let Value::Object(map) = initdata else {
                return Err(Error::invalid("initial data is not a mapping"));
            };
            for (key, value) in map {
                self.write(key, value.clone(), None)?;
            }
        }
        if let Some(docdata) = docdata {
            self.insert_as(docdata, (), None)?;
        }
        Ok(self.run(false))
    }

    /// Run like [`Runtime::process`] and require a clean, complete run
    ///
    /// Returns the run order.
    ///
    /// # Errors
    /// - `process-error` carrying the processor and cleanup errors
    /// - `process-pending` when some processor never became ready
    /// - `process-unknown-keys` when a processor returned undeclared keys
    pub fn process_all(&mut self, initdata: Option<&Value>, docdata: Option<&Value>) -> Result<Vec<String>> {
        let processed = self.process(initdata, docdata)?;
        if !processed.errs.is_empty() {
            return Err(Error::aggregate(What::ProcessError, processed.errs)
                .with_message("processing failed"));
        }

        if !processed.pending.is_empty() {
            let pending: Map<String, Value> = processed
                .pending
                .iter()
                .map(|(name, keys)| (name.clone(), json!(keys)))
                .collect();
            return Err(Error::new(What::ProcessPending)
                .with_message("processors left waiting on unwritten keys")
                .with_data("pending", pending));
        }

        let unknown: Vec<Value> = processed
            .results
            .iter()
            .filter(|(_, outputs)| !outputs.is_empty())
            .map(|(name, outputs)| json!([name, outputs]))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::new(What::ProcessUnknownKeys)
                .with_message("processors returned undeclared keys")
                .with_data("outputs", unknown));
        }
        Ok(processed.schedule())
    }

    fn run(&mut self, dry: bool) -> Processed {
        let mut results = Vec::new();
        let mut errs = Vec::new();

        'rounds: while !self.waiting.is_empty() {
            let waiting = std::mem::take(&mut self.waiting);
            for name in waiting {
                let Some(processor) = self.processors.get(&name).cloned() else {
                    continue;
                };
                match self.process_one(&processor, dry) {
                    Ok(outputs) => results.push((name, outputs)),
                    Err(error) => {
                        warn!(processor = %name, what = %error.what, "processor failed");
                        let cleanup = self.cleanup_all(&name, &error, dry);
                        errs.push(error);
                        errs.extend(cleanup);
                        break 'rounds;
                    }
                }
            }
        }

        Processed {
            results,
            pending: self.pending.clone(),
            errs,
        }
    }

    fn inputs(&self, processor: &Processor) -> Inputs {
        processor
            .reads()
            .iter()
            .map(|key| (key.clone(), self.namespace.get(key).cloned().flatten()))
            .collect()
    }

    fn process_one(&mut self, processor: &Processor, dry: bool) -> Result<Outputs> {
        let name = processor.name();
        self.processed.push(name.to_string());
        trace!(processor = name, dry, "processing");

        let mut outputs = if dry {
            Outputs::new()
        } else {
            processor.process(&self.inputs(processor))?
        };

        for key in processor.writes() {
            if let Some(value) = outputs.remove(key) {
                if let Some(slot) = self.namespace.get_mut(key) {
                    *slot = Some(value);
                }
            }
            self.register_write(key, Some(name));
        }
        Ok(outputs)
    }

    fn cleanup_all(&mut self, failed: &str, error: &Error, dry: bool) -> Vec<Error> {
        let mut errs = Vec::new();
        if dry {
            return errs;
        }
        let started: Vec<String> = self.processed.iter().rev().cloned().collect();
        for name in started {
            let Some(processor) = self.processors.get(&name).cloned() else {
                continue;
            };
            match processor.cleanup(failed, error, &self.inputs(&processor)) {
                Ok(outputs) => {
                    for (key, value) in outputs {
                        if !processor.writes().contains(&key) {
                            continue;
                        }
                        if let Some(slot) = self.namespace.get_mut(&key) {
                            *slot = Some(value);
                        }
                    }
                }
                Err(cleanup_error) => {
                    warn!(processor = %name, what = %cleanup_error.what, "cleanup failed");
                    errs.push(cleanup_error);
                }
            }
        }
        errs
    }
}
