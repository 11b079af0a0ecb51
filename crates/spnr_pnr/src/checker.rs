//! Independent verification of solved models.
//!
//! [`verify`] reads a [`Model`] back into placements and routed paths and
//! checks it against the resource graph and the design without consulting
//! the constraint encoding. A model that passes is a legal mapping.

use crate::modeler::{Model, VarKey};
use serde::Serialize;
use spnr_ir::{Design, OpId, Terminal, ValueId};
use spnr_mrrg::{Mrrg, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A reason a model is not a legal mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// An operation sits on no unit.
    #[error("operation {0} is not placed")]
    Unplaced(String),
    /// A non-duplicable operation sits on several units.
    #[error("operation {op} is placed {count} times")]
    Replicated {
        /// Operation name.
        op: String,
        /// Number of hosting units.
        count: usize,
    },
    /// A unit hosts more than one operation.
    #[error("unit {unit} hosts {ops:?}")]
    Overloaded {
        /// Unit name.
        unit: String,
        /// Names of the hosted operations.
        ops: Vec<String>,
    },
    /// An operation sits on a unit lacking its opcode.
    #[error("operation {op} ({opcode}) placed on unit {unit} which does not support it")]
    Unsupported {
        /// Operation name.
        op: String,
        /// Opcode of the operation.
        opcode: String,
        /// Unit name.
        unit: String,
    },
    /// A node carries more than one net.
    #[error("node {node} carries {count} nets")]
    SharedNode {
        /// Node name.
        node: String,
        /// Number of nets.
        count: usize,
    },
    /// A node carries a flow without carrying its net.
    #[error("node {node} carries a flow of net {value} but not the net itself")]
    FlowWithoutNet {
        /// Node name.
        node: String,
        /// Net ID.
        value: ValueId,
    },
    /// A walk reached a node with no successor carrying the flow.
    #[error("net {value} toward {terminal} dead-ends at {node}")]
    DeadEnd {
        /// Net ID.
        value: ValueId,
        /// Destination as `op.operand`.
        terminal: String,
        /// Last node reached.
        node: String,
    },
    /// A walk reached a node with several successors carrying the flow.
    #[error("net {value} toward {terminal} branches at {node}")]
    Branch {
        /// Net ID.
        value: ValueId,
        /// Destination as `op.operand`.
        terminal: String,
        /// Branching node.
        node: String,
    },
    /// A walk ran longer than the graph allows.
    #[error("net {value} toward {terminal} loops")]
    Loop {
        /// Net ID.
        value: ValueId,
        /// Destination as `op.operand`.
        terminal: String,
    },
    /// No walk reached one of a terminal's destination ports.
    #[error("net {value} never reaches {terminal} at {port}")]
    Unreached {
        /// Net ID.
        value: ValueId,
        /// Destination as `op.operand`.
        terminal: String,
        /// Destination operand port.
        port: String,
    },
}

/// One routed flow from a source unit to a destination operand port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedPath {
    /// The net.
    pub value: ValueId,
    /// The destination the flow serves.
    pub terminal: Terminal,
    /// Nodes from the source unit to the operand port, both included.
    pub nodes: Vec<NodeId>,
}

impl RoutedPath {
    /// The source unit.
    pub fn source(&self) -> NodeId {
        self.nodes[0]
    }

    /// The destination operand port.
    pub fn sink(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }
}

/// A verified mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Solution {
    /// Units hosting each operation.
    pub placements: BTreeMap<OpId, Vec<NodeId>>,
    /// Every routed flow.
    pub paths: Vec<RoutedPath>,
    /// Non-unit nodes whose net bit is set, per value.
    pub nets: BTreeMap<ValueId, BTreeSet<NodeId>>,
}

impl Solution {
    /// Routing nodes the model assigns to `value`, in ID order.
    pub fn carried_nodes(&self, value: ValueId) -> impl Iterator<Item = NodeId> + '_ {
        self.nets.get(&value).into_iter().flatten().copied()
    }

    /// Distinct nodes used by any path.
    pub fn used_nodes(&self) -> BTreeSet<NodeId> {
        self.paths
            .iter()
            .flat_map(|p| p.nodes.iter().copied())
            .collect()
    }

    /// Distinct non-unit nodes used by any path.
    pub fn routing_nodes_used(&self, mrrg: &Mrrg) -> usize {
        self.used_nodes()
            .into_iter()
            .filter(|&n| !mrrg.node(n).is_functional_unit())
            .count()
    }
}

/// Checks a model and reconstructs its mapping.
pub fn verify(mrrg: &Mrrg, design: &Design, model: &Model) -> Result<Solution, CheckError> {
    let placements = check_placement(mrrg, design, model)?;
    let nets = check_nodes(mrrg, design, model)?;
    let paths = trace_paths(mrrg, design, model)?;
    Ok(Solution {
        placements,
        paths,
        nets,
    })
}

fn check_placement(
    mrrg: &Mrrg,
    design: &Design,
    model: &Model,
) -> Result<BTreeMap<OpId, Vec<NodeId>>, CheckError> {
    let mut placements = BTreeMap::new();
    for op in design.operations() {
        let units = model.placements_of(mrrg, op.id);
        match units.len() {
            0 => return Err(CheckError::Unplaced(op.name.clone())),
            1 => {}
            count if !op.duplicate => {
                return Err(CheckError::Replicated {
                    op: op.name.clone(),
                    count,
                })
            }
            _ => {}
        }
        for &fu in &units {
            let node = mrrg.node(fu);
            if !node.ops().is_some_and(|ops| ops.contains(&op.opcode)) {
                return Err(CheckError::Unsupported {
                    op: op.name.clone(),
                    opcode: op.opcode.clone(),
                    unit: node.name.clone(),
                });
            }
        }
        placements.insert(op.id, units);
    }
    for &fu in mrrg.functional_units() {
        let hosted: Vec<String> = design
            .operations()
            .iter()
            .filter(|op| model.is_set(VarKey::Place(fu, op.id)))
            .map(|op| op.name.clone())
            .collect();
        if hosted.len() > 1 {
            return Err(CheckError::Overloaded {
                unit: mrrg.node(fu).name.clone(),
                ops: hosted,
            });
        }
    }
    Ok(placements)
}

fn check_nodes(
    mrrg: &Mrrg,
    design: &Design,
    model: &Model,
) -> Result<BTreeMap<ValueId, BTreeSet<NodeId>>, CheckError> {
    let mut carried: BTreeMap<ValueId, BTreeSet<NodeId>> = BTreeMap::new();
    for id in mrrg.all_nodes() {
        let node = mrrg.node(id);
        let mut nets = 0;
        for value in design.values() {
            let routed = model.is_set(VarKey::Route(id, value.id));
            if routed {
                nets += 1;
                if !node.is_functional_unit() {
                    carried.entry(value.id).or_default().insert(id);
                }
            }
            let flows = value
                .dsts
                .iter()
                .any(|&t| model.is_set(VarKey::RouteTo(id, value.id, t)));
            if flows && !routed {
                return Err(CheckError::FlowWithoutNet {
                    node: node.name.clone(),
                    value: value.id,
                });
            }
        }
        if nets > 1 {
            return Err(CheckError::SharedNode {
                node: node.name.clone(),
                count: nets,
            });
        }
    }
    Ok(carried)
}

/// Walks every flow from its source units.
///
/// Each step follows the single fan-out still carrying the flow; a walk
/// ends at the first destination operand port it meets. Walks that dead-end,
/// branch or outlast the routing-node count are errors, and every
/// destination port of every terminal must end some walk.
pub(crate) fn trace_paths(
    mrrg: &Mrrg,
    design: &Design,
    model: &Model,
) -> Result<Vec<RoutedPath>, CheckError> {
    let limit = mrrg.routing_nodes().len() + 1;
    let mut paths = Vec::new();
    for value in design.values() {
        let sources = model.placements_of(mrrg, value.src);
        for &terminal in &value.dsts {
            let label = terminal_label(design, terminal);
            let targets: BTreeSet<NodeId> = model
                .placements_of(mrrg, terminal.op)
                .into_iter()
                .filter_map(|fu| mrrg.node(fu).operand_port(terminal.operand))
                .collect();
            let carries = |n: NodeId| model.is_set(VarKey::RouteTo(n, value.id, terminal));
            let mut reached = BTreeSet::new();
            for &source in sources.iter().filter(|&&s| carries(s)) {
                let mut nodes = vec![source];
                let mut current = source;
                while !targets.contains(&current) {
                    if nodes.len() > limit {
                        return Err(CheckError::Loop {
                            value: value.id,
                            terminal: label,
                        });
                    }
                    let next: Vec<NodeId> = mrrg
                        .node(current)
                        .fanout_nodes()
                        .into_iter()
                        .filter(|&n| carries(n))
                        .collect();
                    current = match next.as_slice() {
                        [only] => *only,
                        [] => {
                            return Err(CheckError::DeadEnd {
                                value: value.id,
                                terminal: label,
                                node: mrrg.node(current).name.clone(),
                            })
                        }
                        _ => {
                            return Err(CheckError::Branch {
                                value: value.id,
                                terminal: label,
                                node: mrrg.node(current).name.clone(),
                            })
                        }
                    };
                    nodes.push(current);
                }
                reached.insert(current);
                paths.push(RoutedPath {
                    value: value.id,
                    terminal,
                    nodes,
                });
            }
            if let Some(&port) = targets.difference(&reached).next() {
                return Err(CheckError::Unreached {
                    value: value.id,
                    terminal: label,
                    port: mrrg.node(port).name.clone(),
                });
            }
        }
    }
    Ok(paths)
}

fn terminal_label(design: &Design, terminal: Terminal) -> String {
    format!("{}.{}", design.op(terminal.op).name, terminal.operand)
}
