//! Graphviz export of the processor graph
//!
//! Processors are ovals, namespace keys are boxes. Edges run from read
//! keys into a processor and from a processor to its write keys.

use crate::processor::Processor;
use crate::runtime::Runtime;
use std::collections::BTreeSet;
use std::fmt::{self, Write};

const HEADER: &str = "digraph {\n    node [fontname=\"Courier\"];\n    edge [fontname=\"Courier\"];\n\n";

impl Runtime {
    /// Write the processor graph in DOT format
    ///
    /// Processors are listed by name, each key box is declared on first
    /// use.
    ///
    /// # Errors
    /// Whatever `out` returns.
    pub fn write_dot_graph<W: Write>(&self, out: &mut W) -> fmt::Result {
        let mut processors: Vec<&Processor> = self.processors().collect();
        processors.sort_by(|a, b| a.name().cmp(b.name()));

        let mut seen = BTreeSet::new();
        out.write_str(HEADER)?;
        for processor in processors {
            let name = processor.name();
            writeln!(out, "    \"{name}\" [shape=oval]")?;
            for key in processor.reads() {
                if seen.insert(key.as_str()) {
                    writeln!(out, "    \"{key}\" [shape=box]")?;
                }
                writeln!(out, "    \"{key}\" -> \"{name}\"")?;
            }
            for key in processor.writes() {
                if seen.insert(key.as_str()) {
                    writeln!(out, "    \"{key}\" [shape=box]")?;
                }
                writeln!(out, "    \"{name}\" -> \"{key}\"")?;
            }
        }
        out.write_str("}\n")
    }

    /// The processor graph in DOT format
    #[must_use]
    pub fn dot_graph(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_dot_graph(&mut out);
        out
    }
}
