//! DOT netlist front end.
//!
//! Accepts the subset of Graphviz DOT used for dataflow netlists: a single
//! `digraph` whose node statements carry an `opcode` attribute and whose
//! edge statements carry an integer `operand` attribute. `graph`, `node`
//! and `edge` default-attribute statements and `id = id` graph attributes
//! are accepted and ignored. Comments use `//`, `/* */` or a leading `#`.

mod lexer;
mod parser;

use crate::design::Design;
use crate::error::DesignError;
use std::collections::BTreeSet;
use std::path::Path;

/// Parses DOT text into a [`Design`].
pub fn parse_dot(
    source: &str,
    duplicate_opcodes: &BTreeSet<String>,
) -> Result<Design, DesignError> {
    let tokens = lexer::lex(source)?;
    let netlist = parser::Parser::new(tokens).parse_graph()?;
    Design::new(&netlist.operations, &netlist.ties, duplicate_opcodes)
}

/// Reads and parses a DOT netlist file.
pub fn load_dot(path: &Path, duplicate_opcodes: &BTreeSet<String>) -> Result<Design, DesignError> {
    let source = std::fs::read_to_string(path)?;
    parse_dot(&source, duplicate_opcodes)
}
