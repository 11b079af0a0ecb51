//! Resource nodes and their port wiring.

use crate::bimap::BiMultiMap;
use serde::Serialize;
use spnr_common::define_id;
use std::collections::{BTreeMap, BTreeSet};

define_id!(
    /// Dense index of a node in an [`Mrrg`](crate::Mrrg).
    NodeId
);

/// The far side of an edge: a node and the port on that node.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct Endpoint {
    /// The connected node.
    pub node: NodeId,
    /// The port on the connected node.
    pub port: String,
}

/// One directed edge `(src, src_port) -> (dst, dst_port)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct Edge {
    /// Driving node.
    pub src: NodeId,
    /// Output port on the driving node.
    pub src_port: String,
    /// Driven node.
    pub dst: NodeId,
    /// Input port on the driven node.
    pub dst_port: String,
}

/// The closed set of resource node variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// A compute unit.
    FunctionalUnit {
        /// Supported opcodes.
        ops: BTreeSet<String>,
        /// Operand index to the operand-port node feeding it.
        operands: BTreeMap<u32, NodeId>,
    },
    /// N inputs, one output, no storage.
    Mux,
    /// One-context delay element.
    Register,
    /// Pass-through line dedicated to one unit operand.
    OperandPort {
        /// Operand index this port feeds.
        operand: u32,
    },
    /// Synthetic pass-through breaking a mux cycle.
    Tie,
}

impl NodeKind {
    /// Short kind name used in node names and reports.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::FunctionalUnit { .. } => "FunctionalUnit",
            NodeKind::Mux => "Mux",
            NodeKind::Register => "Register",
            NodeKind::OperandPort { .. } => "Port",
            NodeKind::Tie => "Tie",
        }
    }
}

/// A node of the resource graph.
///
/// `inputs` maps each input port to its (at most one) driver; `outputs`
/// maps each output port to the inputs it fans out to. Both are restricted
/// to the node's declared ports.
#[derive(Clone, Debug)]
pub struct Node {
    /// Dense ID.
    pub id: NodeId,
    /// Unique name, `<Kind>_<element>_<context>_<row>_<col>` for fabric nodes.
    pub name: String,
    /// Context this copy belongs to.
    pub context: u32,
    /// Variant data.
    pub kind: NodeKind,
    pub(crate) inputs: BiMultiMap<String, Endpoint>,
    pub(crate) outputs: BiMultiMap<String, Endpoint>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        context: u32,
        kind: NodeKind,
        input_ports: impl IntoIterator<Item = String>,
        output_ports: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id,
            name,
            context,
            kind,
            inputs: BiMultiMap::new(input_ports),
            outputs: BiMultiMap::new(output_ports),
        }
    }

    /// Declared input ports.
    pub fn input_ports(&self) -> &BTreeSet<String> {
        self.inputs.valid_keys()
    }

    /// Declared output ports.
    pub fn output_ports(&self) -> &BTreeSet<String> {
        self.outputs.valid_keys()
    }

    /// Input wiring: input port → driver.
    pub fn inputs(&self) -> &BiMultiMap<String, Endpoint> {
        &self.inputs
    }

    /// Output wiring: output port → driven inputs.
    pub fn outputs(&self) -> &BiMultiMap<String, Endpoint> {
        &self.outputs
    }

    /// The driver of `port`, if wired.
    pub fn driver(&self, port: &str) -> Option<&Endpoint> {
        self.inputs.get(&port.to_string()).next()
    }

    /// Distinct nodes driving this node, in ID order.
    pub fn fanin_nodes(&self) -> Vec<NodeId> {
        dedup_nodes(self.inputs.iter().map(|(_, e)| e.node))
    }

    /// Distinct nodes driven by this node, in ID order.
    pub fn fanout_nodes(&self) -> Vec<NodeId> {
        dedup_nodes(self.outputs.iter().map(|(_, e)| e.node))
    }

    /// Returns `true` for functional units.
    pub fn is_functional_unit(&self) -> bool {
        matches!(self.kind, NodeKind::FunctionalUnit { .. })
    }

    /// Returns `true` for muxes.
    pub fn is_mux(&self) -> bool {
        matches!(self.kind, NodeKind::Mux)
    }

    /// Returns `true` for registers.
    pub fn is_register(&self) -> bool {
        matches!(self.kind, NodeKind::Register)
    }

    /// Returns `true` for operand ports.
    pub fn is_operand_port(&self) -> bool {
        matches!(self.kind, NodeKind::OperandPort { .. })
    }

    /// Supported opcodes, or `None` if this is not a functional unit.
    pub fn ops(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            NodeKind::FunctionalUnit { ops, .. } => Some(ops),
            _ => None,
        }
    }

    /// The operand port feeding operand `operand` of a functional unit.
    pub fn operand_port(&self, operand: u32) -> Option<NodeId> {
        match &self.kind {
            NodeKind::FunctionalUnit { operands, .. } => operands.get(&operand).copied(),
            _ => None,
        }
    }
}

fn dedup_nodes(ids: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}
