//! Dataflow program graph for place-and-route.
//!
//! A [`Design`] holds [`Operation`]s (each with an opcode, at most one output
//! [`Value`] and a map from operand index to input value) and the values
//! connecting them. A value has one source operation and a set of
//! [`Terminal`]s, each naming a destination operation and operand index.
//!
//! Designs are built from a name → opcode map plus a list of ties, or parsed
//! from a DOT digraph with [`parse_dot`] / [`load_dot`].

#![warn(missing_docs)]

pub mod design;
pub mod dot;
pub mod error;
pub mod ids;

pub use design::{Design, Operation, Terminal, Value};
pub use dot::{load_dot, parse_dot};
pub use error::DesignError;
pub use ids::{OpId, ValueId};
