//! The finished resource graph and graph-wide queries.

use crate::node::{Edge, Node, NodeId, NodeKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Read access to a set of nodes, shared by the builder and [`Mrrg`].
pub(crate) trait NodeStore {
    fn get(&self, id: NodeId) -> Option<&Node>;
    fn live_ids(&self) -> Vec<NodeId>;
}

/// A multi-context routing-resource graph with dense node IDs.
#[derive(Clone, Debug)]
pub struct Mrrg {
    pub(crate) nodes: Vec<Node>,
    pub(crate) functional_units: Vec<NodeId>,
    pub(crate) routing_nodes: Vec<NodeId>,
    pub(crate) contexts: u32,
}

impl Mrrg {
    /// The node with the given ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Looks up a node by name.
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// All functional units.
    pub fn functional_units(&self) -> &[NodeId] {
        &self.functional_units
    }

    /// Every node that is not a functional unit.
    pub fn routing_nodes(&self) -> &[NodeId] {
        &self.routing_nodes
    }

    /// Every node, in ID order.
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of contexts the fabric was replicated over.
    pub fn contexts(&self) -> u32 {
        self.contexts
    }

    /// All edges, ordered by source node.
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes.iter().flat_map(outgoing_edges).collect()
    }

    /// Node and edge counts.
    pub fn stats(&self) -> MrrgStats {
        let mut stats = MrrgStats {
            contexts: self.contexts,
            ..MrrgStats::default()
        };
        for node in &self.nodes {
            match node.kind {
                NodeKind::FunctionalUnit { .. } => stats.functional_units += 1,
                NodeKind::Mux => stats.muxes += 1,
                NodeKind::Register => stats.registers += 1,
                NodeKind::OperandPort { .. } => stats.operand_ports += 1,
                NodeKind::Tie => stats.ties += 1,
            }
            stats.edges += node.outputs.len();
        }
        stats
    }

    /// Number of functional units supporting each opcode.
    pub fn opcode_supply(&self) -> BTreeMap<&str, usize> {
        let mut supply = BTreeMap::new();
        for &fu in &self.functional_units {
            for op in self.node(fu).ops().into_iter().flatten() {
                *supply.entry(op.as_str()).or_insert(0) += 1;
            }
        }
        supply
    }
}

impl NodeStore for Mrrg {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn live_ids(&self) -> Vec<NodeId> {
        self.all_nodes().collect()
    }
}

/// Summary counts for a resource graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MrrgStats {
    /// Contexts.
    pub contexts: u32,
    /// Functional units.
    pub functional_units: usize,
    /// Muxes.
    pub muxes: usize,
    /// Registers.
    pub registers: usize,
    /// Operand ports.
    pub operand_ports: usize,
    /// Tie nodes.
    pub ties: usize,
    /// Edges.
    pub edges: usize,
}

pub(crate) fn outgoing_edges(node: &Node) -> impl Iterator<Item = Edge> + '_ {
    node.outputs.iter().map(move |(port, e)| Edge {
        src: node.id,
        src_port: port.clone(),
        dst: e.node,
        dst_port: e.port.clone(),
    })
}

/// Back edges of the mux-to-mux subgraph.
///
/// Runs an iterative depth-first search from every unvisited mux, following
/// only edges whose destination is also a mux. An edge into a mux still on
/// the DFS stack is a back edge. The graph is acyclic over muxes exactly
/// when the result is empty.
///
/// Roots are taken in ascending node ID and each node's edges in output-port
/// then endpoint order, so the same graph always yields the same edges.
pub fn find_mux_back_edges(mrrg: &Mrrg) -> Vec<Edge> {
    mux_back_edges(mrrg)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

pub(crate) fn mux_back_edges(store: &impl NodeStore) -> Vec<Edge> {
    let mux_edges = |id: NodeId| -> Vec<Edge> {
        store
            .get(id)
            .map(|n| {
                outgoing_edges(n)
                    .filter(|e| store.get(e.dst).is_some_and(Node::is_mux))
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut marks: BTreeMap<NodeId, Mark> = BTreeMap::new();
    let mut back = Vec::new();
    for root in store.live_ids() {
        if !store.get(root).is_some_and(Node::is_mux) {
            continue;
        }
        if marks.get(&root).copied().unwrap_or(Mark::Unvisited) != Mark::Unvisited {
            continue;
        }
        marks.insert(root, Mark::OnStack);
        let mut stack: Vec<(NodeId, Vec<Edge>, usize)> = vec![(root, mux_edges(root), 0)];
        while let Some((node, edges, next)) = stack.last_mut() {
            if *next == edges.len() {
                marks.insert(*node, Mark::Done);
                stack.pop();
                continue;
            }
            let edge = edges[*next].clone();
            *next += 1;
            match marks.get(&edge.dst).copied().unwrap_or(Mark::Unvisited) {
                Mark::OnStack => back.push(edge),
                Mark::Done => {}
                Mark::Unvisited => {
                    marks.insert(edge.dst, Mark::OnStack);
                    let children = mux_edges(edge.dst);
                    stack.push((edge.dst, children, 0));
                }
            }
        }
    }
    back
}
