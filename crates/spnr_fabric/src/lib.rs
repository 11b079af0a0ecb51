//! Flattened CGRA fabric descriptions.
//!
//! A [`Fabric`] is the front end's view of the hardware: blocks at grid
//! locations, each holding typed instances (functional units and registers),
//! muxes and operand ports, plus a flat list of point-to-point [`Tie`]s
//! between `(location, element, port)` addresses. Hierarchy has already been
//! flattened away. [`Fabric::validate`] performs the structural checks the
//! resource-graph builder relies on, so the builder never re-validates.
//!
//! Fabrics are loaded from JSON ([`load_fabric`]) or assembled in code with
//! [`FabricBuilder`].

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod loader;
pub mod types;
mod validate;

pub use builder::FabricBuilder;
pub use error::FabricError;
pub use loader::{fabric_from_json, load_fabric};
pub use types::{
    Address, Block, Element, Fabric, Instance, InstanceKind, Location, MuxDecl, OperandPortDecl,
    Tie,
};
