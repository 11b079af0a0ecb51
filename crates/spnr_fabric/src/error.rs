//! Error types for fabric loading and validation.

use crate::types::{Address, Location};

/// Structural problems found in a fabric description.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// An I/O error occurred while reading the fabric file.
    #[error("failed to read fabric: {0}")]
    IoError(#[from] std::io::Error),

    /// The JSON content could not be parsed.
    #[error("failed to parse fabric: {0}")]
    ParseError(String),

    /// Two blocks share one grid location.
    #[error("duplicate block at {0}")]
    DuplicateLocation(Location),

    /// Two elements of one block share a name.
    #[error("duplicate element '{name}' in block at {location}")]
    DuplicateName {
        /// Block location.
        location: Location,
        /// The repeated name.
        name: String,
    },

    /// An element uses one port name as both input and output.
    #[error("element '{name}' at {location} has port '{port}' as both input and output")]
    PortOverlap {
        /// Block location.
        location: Location,
        /// Element name.
        name: String,
        /// The overlapping port.
        port: String,
    },

    /// A tie refers to an element that does not exist.
    #[error("tie references unknown element {0}")]
    UnknownElement(Address),

    /// A tie source is not an output port or a tie destination is not an input port.
    #[error("tie references {0}, which is not a port of the expected direction")]
    BadPort(Address),

    /// An input port is driven by more than one tie.
    #[error("input {0} has more than one driver")]
    MultipleDrivers(Address),

    /// A functional-unit input is driven by something other than an operand port.
    #[error("functional-unit input {0} must be driven by an operand port")]
    UnitInputNotFromOperandPort(Address),

    /// Two operand ports feeding one functional unit carry the same operand index.
    #[error("operand {operand} of unit at {address} is bound twice")]
    DuplicateOperand {
        /// Address of the unit input that repeats the operand.
        address: Address,
        /// The repeated operand index.
        operand: u32,
    },
}
