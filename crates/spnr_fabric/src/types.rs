//! Fabric description types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A grid location `(row, col)` of a block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Location {
    /// Grid row.
    pub row: u32,
    /// Grid column.
    pub col: u32,
}

impl Location {
    /// Creates a location.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The kind of a block instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceKind {
    /// A compute unit executing one of its supported opcodes.
    FunctionalUnit,
    /// A one-context delay element.
    Register,
}

/// A typed instance inside a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance name, unique within its block.
    pub name: String,
    /// Instance kind.
    pub kind: InstanceKind,
    /// Input port names.
    pub input_ports: Vec<String>,
    /// Output port names.
    pub output_ports: Vec<String>,
    /// Supported opcodes (functional units only).
    #[serde(default)]
    pub ops: BTreeSet<String>,
}

/// A routing multiplexer: many inputs, one output, no storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MuxDecl {
    /// Mux name, unique within its block.
    pub name: String,
    /// Input port names.
    pub input_ports: Vec<String>,
    /// The single output port name.
    pub output_port: String,
}

/// A pass-through line dedicated to one functional-unit operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperandPortDecl {
    /// Port element name, unique within its block.
    pub name: String,
    /// The single input port name.
    pub input_port: String,
    /// The single output port name.
    pub output_port: String,
    /// Operand index of the unit input this port feeds.
    pub operand: u32,
}

/// A fabric block at one grid location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Grid location.
    pub location: Location,
    /// Functional units and registers.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Muxes.
    #[serde(default)]
    pub muxes: Vec<MuxDecl>,
    /// Operand ports.
    #[serde(default)]
    pub operand_ports: Vec<OperandPortDecl>,
}

impl Block {
    /// Creates an empty block.
    pub fn new(location: Location) -> Self {
        Self {
            location,
            instances: Vec::new(),
            muxes: Vec::new(),
            operand_ports: Vec::new(),
        }
    }

    /// Looks up an element of this block by name.
    pub fn element(&self, name: &str) -> Option<Element<'_>> {
        if let Some(inst) = self.instances.iter().find(|i| i.name == name) {
            return Some(Element::Instance(inst));
        }
        if let Some(mux) = self.muxes.iter().find(|m| m.name == name) {
            return Some(Element::Mux(mux));
        }
        self.operand_ports
            .iter()
            .find(|p| p.name == name)
            .map(Element::OperandPort)
    }

    /// Iterates over every element of this block.
    pub fn elements(&self) -> impl Iterator<Item = Element<'_>> {
        self.instances
            .iter()
            .map(Element::Instance)
            .chain(self.muxes.iter().map(Element::Mux))
            .chain(self.operand_ports.iter().map(Element::OperandPort))
    }
}

/// A borrowed view of any block element.
#[derive(Clone, Copy, Debug)]
pub enum Element<'a> {
    /// A functional unit or register.
    Instance(&'a Instance),
    /// A mux.
    Mux(&'a MuxDecl),
    /// An operand port.
    OperandPort(&'a OperandPortDecl),
}

impl<'a> Element<'a> {
    /// The element name.
    pub fn name(&self) -> &'a str {
        match self {
            Element::Instance(i) => &i.name,
            Element::Mux(m) => &m.name,
            Element::OperandPort(p) => &p.name,
        }
    }

    /// The element's input port names.
    pub fn input_ports(&self) -> Vec<&'a str> {
        match self {
            Element::Instance(i) => i.input_ports.iter().map(String::as_str).collect(),
            Element::Mux(m) => m.input_ports.iter().map(String::as_str).collect(),
            Element::OperandPort(p) => vec![p.input_port.as_str()],
        }
    }

    /// The element's output port names.
    pub fn output_ports(&self) -> Vec<&'a str> {
        match self {
            Element::Instance(i) => i.output_ports.iter().map(String::as_str).collect(),
            Element::Mux(m) => vec![m.output_port.as_str()],
            Element::OperandPort(p) => vec![p.output_port.as_str()],
        }
    }

    /// Returns `true` if `port` is one of the element's inputs.
    pub fn has_input(&self, port: &str) -> bool {
        self.input_ports().contains(&port)
    }

    /// Returns `true` if `port` is one of the element's outputs.
    pub fn has_output(&self, port: &str) -> bool {
        self.output_ports().contains(&port)
    }
}

/// A fully flattened port address: `(location, element, port)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Address {
    /// Block location.
    pub location: Location,
    /// Element name within the block.
    pub element: String,
    /// Port name on the element.
    pub port: String,
}

impl Address {
    /// Creates an address.
    pub fn new(location: Location, element: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            location,
            element: element.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.location, self.element, self.port)
    }
}

/// A point-to-point connection from an output port to an input port.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Tie {
    /// Driving output port.
    pub src: Address,
    /// Driven input port.
    pub dst: Address,
}

/// A flattened fabric: blocks plus the global tie list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fabric {
    /// All blocks, one per occupied grid location.
    pub blocks: Vec<Block>,
    /// All point-to-point ties.
    #[serde(default)]
    pub ties: Vec<Tie>,
}

impl Fabric {
    /// Returns the block at `location`, if any.
    pub fn block(&self, location: Location) -> Option<&Block> {
        self.blocks.iter().find(|b| b.location == location)
    }

    /// Resolves the element named by an address.
    pub fn resolve(&self, address: &Address) -> Option<Element<'_>> {
        self.block(address.location)?.element(&address.element)
    }

    /// Counts instances of the given kind across all blocks.
    pub fn instance_count(&self, kind: InstanceKind) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| &b.instances)
            .filter(|i| i.kind == kind)
            .count()
    }
}
