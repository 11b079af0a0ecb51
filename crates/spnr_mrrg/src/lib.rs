//! Multi-context routing-resource graph (MRRG).
//!
//! [`build_mrrg`] turns a validated [`Fabric`](spnr_fabric::Fabric) into a
//! graph of typed [`Node`]s: functional units, muxes, registers, operand
//! ports and synthetic tie nodes. The fabric is replicated once per context;
//! registers deliver into the next context, or are elided when there is only
//! one. Mux-to-mux cycles are cut with tie nodes so that every routed net has
//! a finite forwarding chain.

#![warn(missing_docs)]

pub mod bimap;
pub mod builder;
pub mod graph;
pub mod node;

pub use bimap::BiMultiMap;
pub use builder::{build_mrrg, MrrgOptions};
pub use graph::{find_mux_back_edges, Mrrg, MrrgStats};
pub use node::{Edge, Endpoint, Node, NodeId, NodeKind};
