//! Construction of an [`Mrrg`] from a validated [`Fabric`].

use crate::graph::{mux_back_edges, Mrrg, NodeStore};
use crate::node::{Edge, Endpoint, Node, NodeId, NodeKind};
use spnr_common::{internal_bail, internal_ensure, InternalError, SpnrResult};
use spnr_config::{CycleBreakPolicy, MrrgConfig, RegisterPolicy};
use spnr_fabric::{Address, Element, Fabric, InstanceKind, Location};
use std::collections::BTreeMap;

/// Resource-graph construction options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MrrgOptions {
    /// Number of contexts; at least 1.
    pub contexts: u32,
    /// Tie-node insertion policy.
    pub cycle_break: CycleBreakPolicy,
    /// Register handling for a single context.
    pub registers: RegisterPolicy,
}

impl Default for MrrgOptions {
    fn default() -> Self {
        Self::from(&MrrgConfig::default())
    }
}

impl From<&MrrgConfig> for MrrgOptions {
    fn from(config: &MrrgConfig) -> Self {
        Self {
            contexts: config.contexts,
            cycle_break: config.cycle_break,
            registers: config.registers,
        }
    }
}

/// Builds the resource graph for `fabric`.
///
/// Every fabric element is replicated once per context and every tie is
/// wired in every context; ties leaving a register land in the next context.
/// With a single context, registers are then elided or retained, cycles are
/// broken per the policy, the wiring sanity check runs, and node IDs are
/// compacted.
///
/// Fails with an [`InternalError`] if a tie does not resolve, an input gets
/// two drivers, a unit input is fed by anything but a fresh operand port, or
/// a self or two-hop loop remains.
pub fn build_mrrg(fabric: &Fabric, options: &MrrgOptions) -> SpnrResult<Mrrg> {
    internal_ensure!(options.contexts >= 1, "contexts must be at least 1");
    let mut builder = Builder::default();
    builder.instantiate(fabric, options.contexts)?;
    builder.wire_ties(fabric, options.contexts)?;
    if options.contexts == 1 && options.registers == RegisterPolicy::Elide {
        builder.elide_registers()?;
    }
    match options.cycle_break {
        CycleBreakPolicy::BackEdges => builder.break_back_edges()?,
        CycleBreakPolicy::AllMuxEdges => builder.break_all_mux_edges()?,
        CycleBreakPolicy::None => {}
    }
    builder.check_short_loops()?;
    builder.finish(options.contexts)
}

#[derive(Default)]
struct Builder {
    slots: Vec<Option<Node>>,
    index: BTreeMap<(u32, Location, String), NodeId>,
}

impl NodeStore for Builder {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn live_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .flatten()
            .map(|n| n.id)
            .collect()
    }
}

impl Builder {
    fn add(
        &mut self,
        name: String,
        context: u32,
        kind: NodeKind,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> NodeId {
        let id = NodeId::from_index(self.slots.len());
        self.slots
            .push(Some(Node::new(id, name, context, kind, inputs, outputs)));
        id
    }

    fn node(&self, id: NodeId) -> SpnrResult<&Node> {
        self.get(id)
            .ok_or_else(|| InternalError::new(format!("node {id} does not exist")))
    }

    fn node_mut(&mut self, id: NodeId) -> SpnrResult<&mut Node> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| InternalError::new(format!("node {id} does not exist")))
    }

    fn instantiate(&mut self, fabric: &Fabric, contexts: u32) -> SpnrResult<()> {
        for ctx in 0..contexts {
            for block in &fabric.blocks {
                let loc = block.location;
                for element in block.elements() {
                    let kind = match element {
                        Element::Instance(inst) if inst.kind == InstanceKind::Register => {
                            NodeKind::Register
                        }
                        Element::Instance(inst) => NodeKind::FunctionalUnit {
                            ops: inst.ops.clone(),
                            operands: BTreeMap::new(),
                        },
                        Element::Mux(_) => NodeKind::Mux,
                        Element::OperandPort(p) => NodeKind::OperandPort { operand: p.operand },
                    };
                    let name = format!(
                        "{}_{}_{ctx}_{}_{}",
                        kind.label(),
                        element.name(),
                        loc.row,
                        loc.col
                    );
                    let inputs = element.input_ports().into_iter().map(String::from).collect();
                    let outputs = element.output_ports().into_iter().map(String::from).collect();
                    let id = self.add(name, ctx, kind, inputs, outputs);
                    let key = (ctx, loc, element.name().to_string());
                    if self.index.insert(key, id).is_some() {
                        internal_bail!("element '{}' at {loc} allocated twice", element.name());
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, ctx: u32, address: &Address) -> SpnrResult<NodeId> {
        self.index
            .get(&(ctx, address.location, address.element.clone()))
            .copied()
            .ok_or_else(|| InternalError::new(format!("tie address {address} has no node")))
    }

    fn wire_ties(&mut self, fabric: &Fabric, contexts: u32) -> SpnrResult<()> {
        for ctx in 0..contexts {
            for tie in &fabric.ties {
                let src = self.resolve(ctx, &tie.src)?;
                let dst_ctx = if self.node(src)?.is_register() {
                    (ctx + 1) % contexts
                } else {
                    ctx
                };
                let dst = self.resolve(dst_ctx, &tie.dst)?;
                self.wire(src, &tie.src.port, dst, &tie.dst.port)?;
            }
        }
        Ok(())
    }

    /// Connects `(src, src_port)` to `(dst, dst_port)`.
    fn wire(&mut self, src: NodeId, src_port: &str, dst: NodeId, dst_port: &str) -> SpnrResult<()> {
        internal_ensure!(
            src != dst,
            "self edge on {} ({src_port} -> {dst_port})",
            self.node(src)?.name
        );
        let src_node = self.node(src)?;
        let src_operand = match src_node.kind {
            NodeKind::OperandPort { operand } => Some(operand),
            _ => None,
        };
        let src_name = src_node.name.clone();
        internal_ensure!(
            src_node.outputs.is_valid_key(&src_port.to_string()),
            "{src_name} has no output port {src_port}"
        );

        let dst_node = self.node(dst)?;
        internal_ensure!(
            dst_node.inputs.is_valid_key(&dst_port.to_string()),
            "{} has no input port {dst_port}",
            dst_node.name
        );
        if let Some(driver) = dst_node.driver(dst_port) {
            internal_bail!(
                "{}.{dst_port} already driven by node {}, cannot add {src_name}",
                dst_node.name,
                driver.node
            );
        }

        let dst_node = self.node_mut(dst)?;
        if let NodeKind::FunctionalUnit { operands, .. } = &mut dst_node.kind {
            let Some(operand) = src_operand else {
                internal_bail!("{} input {dst_port} driven by non-port {src_name}", dst_node.name);
            };
            if operands.insert(operand, src).is_some() {
                internal_bail!("{} operand {operand} bound twice", dst_node.name);
            }
        }
        dst_node.inputs.insert(
            dst_port.to_string(),
            Endpoint {
                node: src,
                port: src_port.to_string(),
            },
        )?;
        self.node_mut(src)?.outputs.insert(
            src_port.to_string(),
            Endpoint {
                node: dst,
                port: dst_port.to_string(),
            },
        )?;
        Ok(())
    }

    fn unwire(&mut self, edge: &Edge) -> SpnrResult<()> {
        let removed_out = self.node_mut(edge.src)?.outputs.remove(
            &edge.src_port,
            &Endpoint {
                node: edge.dst,
                port: edge.dst_port.clone(),
            },
        );
        let dst = self.node_mut(edge.dst)?;
        let removed_in = dst.inputs.remove(
            &edge.dst_port,
            &Endpoint {
                node: edge.src,
                port: edge.src_port.clone(),
            },
        );
        internal_ensure!(
            removed_out && removed_in,
            "unwire of missing edge {} -> {}",
            edge.src,
            edge.dst
        );
        if let NodeKind::FunctionalUnit { operands, .. } = &mut dst.kind {
            operands.retain(|_, port| *port != edge.src);
        }
        Ok(())
    }

    fn incoming(&self, id: NodeId) -> SpnrResult<Vec<Edge>> {
        let node = self.node(id)?;
        Ok(node
            .inputs
            .iter()
            .map(|(port, e)| Edge {
                src: e.node,
                src_port: e.port.clone(),
                dst: id,
                dst_port: port.clone(),
            })
            .collect())
    }

    fn outgoing(&self, id: NodeId) -> SpnrResult<Vec<Edge>> {
        Ok(crate::graph::outgoing_edges(self.node(id)?).collect())
    }

    /// Splices every register out of the graph: its driver is wired straight
    /// to each of its consumers, keeping the driver's output port and the
    /// consumers' input ports.
    fn elide_registers(&mut self) -> SpnrResult<()> {
        let registers: Vec<NodeId> = self
            .live_ids()
            .into_iter()
            .filter(|&id| self.get(id).is_some_and(Node::is_register))
            .collect();
        for reg in registers {
            let incoming = self.incoming(reg)?;
            let outgoing = self.outgoing(reg)?;
            for edge in incoming.iter().chain(&outgoing) {
                self.unwire(edge)?;
            }
            if let Some(driver) = incoming.first() {
                for edge in &outgoing {
                    self.wire(driver.src, &driver.src_port, edge.dst, &edge.dst_port)?;
                }
            }
            self.slots[reg.index()] = None;
        }
        Ok(())
    }

    /// Replaces `src -> dst` with `src -> tie -> dst`.
    fn split_with_tie(&mut self, edge: &Edge) -> SpnrResult<()> {
        self.unwire(edge)?;
        let src = self.node(edge.src)?;
        let dst = self.node(edge.dst)?;
        let name = format!("Tie_{}_{}_{}_{}", src.name, edge.src_port, dst.name, edge.dst_port);
        let context = src.context;
        let in_port = edge.dst_port.clone();
        let out_port = if edge.src_port == edge.dst_port {
            format!("{}_out", edge.src_port)
        } else {
            edge.src_port.clone()
        };
        let tie = self.add(
            name,
            context,
            NodeKind::Tie,
            vec![in_port.clone()],
            vec![out_port.clone()],
        );
        self.wire(edge.src, &edge.src_port, tie, &in_port)?;
        self.wire(tie, &out_port, edge.dst, &edge.dst_port)?;
        Ok(())
    }

    fn break_back_edges(&mut self) -> SpnrResult<()> {
        loop {
            let back = mux_back_edges(&*self);
            if back.is_empty() {
                return Ok(());
            }
            for edge in &back {
                self.split_with_tie(edge)?;
            }
        }
    }

    fn break_all_mux_edges(&mut self) -> SpnrResult<()> {
        let mut mux_edges = Vec::new();
        for id in self.live_ids() {
            for edge in self.outgoing(id)? {
                if self.node(edge.src)?.is_mux() && self.node(edge.dst)?.is_mux() {
                    mux_edges.push(edge);
                }
            }
        }
        for edge in &mux_edges {
            self.split_with_tie(edge)?;
        }
        Ok(())
    }

    /// No node may reach itself in one or two forward hops.
    fn check_short_loops(&self) -> SpnrResult<()> {
        for id in self.live_ids() {
            let node = self.node(id)?;
            for next in node.fanout_nodes() {
                internal_ensure!(next != id, "self loop on {}", node.name);
                for next2 in self.node(next)?.fanout_nodes() {
                    internal_ensure!(
                        next2 != id,
                        "two-hop loop {} -> {} -> {}",
                        node.name,
                        self.node(next)?.name,
                        node.name
                    );
                }
            }
        }
        Ok(())
    }

    /// Renumbers surviving nodes densely and partitions them.
    fn finish(self, contexts: u32) -> SpnrResult<Mrrg> {
        let mut remap = BTreeMap::new();
        for (new, node) in self.slots.iter().flatten().enumerate() {
            remap.insert(node.id, NodeId::from_index(new));
        }
        let lookup = |old: NodeId| -> SpnrResult<NodeId> {
            remap
                .get(&old)
                .copied()
                .ok_or_else(|| InternalError::new(format!("edge to removed node {old}")))
        };
        let rewrite = |e: &Endpoint| -> SpnrResult<Endpoint> {
            Ok(Endpoint {
                node: lookup(e.node)?,
                port: e.port.clone(),
            })
        };

        let mut nodes = Vec::with_capacity(remap.len());
        for node in self.slots.into_iter().flatten() {
            let inputs = node.inputs.try_map_values(&rewrite)?;
            let outputs = node.outputs.try_map_values(&rewrite)?;
            let kind = match node.kind {
                NodeKind::FunctionalUnit { ops, operands } => NodeKind::FunctionalUnit {
                    ops,
                    operands: operands
                        .into_iter()
                        .map(|(k, v)| lookup(v).map(|v| (k, v)))
                        .collect::<SpnrResult<_>>()?,
                },
                other => other,
            };
            nodes.push(Node {
                id: lookup(node.id)?,
                name: node.name,
                context: node.context,
                kind,
                inputs,
                outputs,
            });
        }

        let (functional_units, routing_nodes): (Vec<NodeId>, Vec<NodeId>) = nodes
            .iter()
            .map(|n| n.id)
            .partition(|id| nodes[id.index()].is_functional_unit());
        Ok(Mrrg {
            nodes,
            functional_units,
            routing_nodes,
            contexts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::find_mux_back_edges;
    use spnr_fabric::{FabricBuilder, Tie};

    const L: Location = Location::new(0, 0);

    fn at(element: &str, port: &str) -> Address {
        Address::new(L, element, port)
    }

    fn options(
        contexts: u32,
        cycle_break: CycleBreakPolicy,
        registers: RegisterPolicy,
    ) -> MrrgOptions {
        MrrgOptions {
            contexts,
            cycle_break,
            registers,
        }
    }

    /// `m -> alu.a`, `alu.out -> r -> m.in1`
    fn unit_with_register() -> Fabric {
        let mut b = FabricBuilder::new();
        b.functional_unit(L, "alu", &["add"], &["a", "b"])
            .mux(L, "m", 2)
            .register(L, "r")
            .connect(at("m", "out"), at("alu", "a"))
            .connect(at("alu", "out"), at("r", "in"))
            .connect(at("r", "out"), at("m", "in1"));
        b.build().unwrap()
    }

    fn mux_ring(n: usize) -> Fabric {
        let mut b = FabricBuilder::new();
        for i in 0..n {
            b.mux(L, &format!("m{i}"), 2);
        }
        for i in 0..n {
            b.connect(at(&format!("m{i}"), "out"), at(&format!("m{}", (i + 1) % n), "in0"));
        }
        b.build().unwrap()
    }

    #[test]
    fn single_context_nodes_and_operands() {
        let g = build_mrrg(&unit_with_register(), &MrrgOptions::default()).unwrap();
        // alu, two operand ports, mux; the register is elided
        assert_eq!(g.len(), 4);
        assert_eq!(g.functional_units().len(), 1);
        assert_eq!(g.routing_nodes().len(), 3);

        let alu = g.node_by_name("FunctionalUnit_alu_0_0_0").unwrap();
        let port_a = alu.operand_port(0).unwrap();
        assert_eq!(g.node(port_a).name, "Port_PORT-alu-a_0_0_0");
        assert!(matches!(g.node(port_a).kind, NodeKind::OperandPort { operand: 0 }));
        assert!(alu.operand_port(1).is_some());
        assert!(g.node_by_name("Register_r_0_0_0").is_none());
    }

    #[test]
    fn register_elision_splices_ports() {
        let g = build_mrrg(&unit_with_register(), &MrrgOptions::default()).unwrap();
        let alu = g.node_by_name("FunctionalUnit_alu_0_0_0").unwrap();
        let m = g.node_by_name("Mux_m_0_0_0").unwrap();
        let driver = m.driver("in1").unwrap();
        assert_eq!(driver.node, alu.id);
        assert_eq!(driver.port, "out");
        assert!(alu
            .outputs()
            .get(&"out".to_string())
            .any(|e| e.node == m.id && e.port == "in1"));
        assert_eq!(g.stats().registers, 0);
    }

    #[test]
    fn register_retained_as_pass_through() {
        let opts = options(1, CycleBreakPolicy::BackEdges, RegisterPolicy::Retain);
        let g = build_mrrg(&unit_with_register(), &opts).unwrap();
        let r = g.node_by_name("Register_r_0_0_0").unwrap();
        assert_eq!(r.fanin_nodes(), vec![g.node_by_name("FunctionalUnit_alu_0_0_0").unwrap().id]);
        assert_eq!(r.fanout_nodes(), vec![g.node_by_name("Mux_m_0_0_0").unwrap().id]);
        assert_eq!(g.stats().registers, 1);
    }

    #[test]
    fn contexts_replicate_everything() {
        let fabric = unit_with_register();
        let retain = |n| options(n, CycleBreakPolicy::BackEdges, RegisterPolicy::Retain);
        let one = build_mrrg(&fabric, &retain(1)).unwrap();
        let three = build_mrrg(&fabric, &retain(3)).unwrap();
        assert_eq!(three.len(), 3 * one.len());
        assert_eq!(three.stats().edges, 3 * one.stats().edges);
        assert_eq!(three.functional_units().len(), 3);
        assert_eq!(three.contexts(), 3);
        for ctx in 0..3 {
            assert!(three.node_by_name(&format!("Mux_m_{ctx}_0_0")).is_some());
        }
    }

    #[test]
    fn register_delivers_to_next_context() {
        let elide = options(2, CycleBreakPolicy::BackEdges, RegisterPolicy::Elide);
        let g = build_mrrg(&unit_with_register(), &elide).unwrap();
        let r0 = g.node_by_name("Register_r_0_0_0").unwrap();
        let r1 = g.node_by_name("Register_r_1_0_0").unwrap();
        let m0 = g.node_by_name("Mux_m_0_0_0").unwrap();
        let m1 = g.node_by_name("Mux_m_1_0_0").unwrap();
        assert_eq!(r0.fanout_nodes(), vec![m1.id]);
        assert_eq!(r1.fanout_nodes(), vec![m0.id]);
        // the register input stays within its own context
        let alu0 = g.node_by_name("FunctionalUnit_alu_0_0_0").unwrap();
        assert_eq!(r0.fanin_nodes(), vec![alu0.id]);
    }

    #[test]
    fn back_edge_policy_breaks_ring_minimally() {
        let g = build_mrrg(&mux_ring(3), &MrrgOptions::default()).unwrap();
        assert_eq!(g.stats().ties, 1);
        assert!(find_mux_back_edges(&g).is_empty());
        // The search starts at m0, so the edge closing the ring is m2 -> m0.
        let tie = g
            .all_nodes()
            .map(|id| g.node(id))
            .find(|n| matches!(n.kind, NodeKind::Tie))
            .unwrap();
        let names = |ids: Vec<NodeId>| -> Vec<String> {
            ids.into_iter().map(|id| g.node(id).name.clone()).collect()
        };
        assert_eq!(names(tie.fanin_nodes()), ["Mux_m2_0_0_0"]);
        assert_eq!(names(tie.fanout_nodes()), ["Mux_m0_0_0_0"]);
    }

    #[test]
    fn all_mux_edges_policy_splits_every_edge() {
        let opts = options(1, CycleBreakPolicy::AllMuxEdges, RegisterPolicy::Elide);
        let g = build_mrrg(&mux_ring(3), &opts).unwrap();
        assert_eq!(g.stats().ties, 3);
        assert_eq!(g.stats().edges, 6);
        assert!(find_mux_back_edges(&g).is_empty());
    }

    #[test]
    fn tie_node_carries_original_port_names() {
        let g = build_mrrg(&mux_ring(2), &MrrgOptions::default()).unwrap();
        let tie = g
            .all_nodes()
            .map(|id| g.node(id))
            .find(|n| matches!(n.kind, NodeKind::Tie))
            .unwrap();
        assert_eq!(tie.input_ports().iter().next().unwrap(), "in0");
        assert_eq!(tie.output_ports().iter().next().unwrap(), "out");
    }

    #[test]
    fn back_edge_search_is_idempotent() {
        let mut b = FabricBuilder::new();
        for i in 0..4 {
            b.mux(L, &format!("m{i}"), 2);
        }
        b.connect(at("m0", "out"), at("m1", "in0"))
            .connect(at("m1", "out"), at("m2", "in0"))
            .connect(at("m2", "out"), at("m0", "in0"))
            .connect(at("m1", "out"), at("m3", "in0"))
            .connect(at("m3", "out"), at("m1", "in1"));
        let fabric = b.build().unwrap();
        let g = build_mrrg(&fabric, &MrrgOptions::default()).unwrap();
        assert!(g.stats().ties >= 2);
        assert!(find_mux_back_edges(&g).is_empty());
    }

    #[test]
    fn unbroken_two_cycle_is_fatal() {
        let opts = options(1, CycleBreakPolicy::None, RegisterPolicy::Elide);
        assert!(build_mrrg(&mux_ring(2), &opts).is_err());
        // longer rings pass the short-loop check and are reported by the search
        let g = build_mrrg(&mux_ring(3), &opts).unwrap();
        assert_eq!(find_mux_back_edges(&g).len(), 1);
    }

    #[test]
    fn elision_creating_self_loop_is_fatal() {
        let mut b = FabricBuilder::new();
        b.mux(L, "m", 1)
            .register(L, "r")
            .connect(at("m", "out"), at("r", "in"))
            .connect(at("r", "out"), at("m", "in0"));
        let fabric = b.build().unwrap();
        assert!(build_mrrg(&fabric, &MrrgOptions::default()).is_err());
    }

    #[test]
    fn zero_contexts_rejected() {
        let opts = options(0, CycleBreakPolicy::BackEdges, RegisterPolicy::Elide);
        assert!(build_mrrg(&mux_ring(3), &opts).is_err());
    }

    #[test]
    fn unresolved_tie_is_fatal() {
        let mut fabric = mux_ring(3);
        fabric.ties.push(Tie {
            src: at("ghost", "out"),
            dst: at("m0", "in1"),
        });
        assert!(build_mrrg(&fabric, &MrrgOptions::default()).is_err());
    }

    #[test]
    fn second_driver_is_fatal() {
        let mut fabric = mux_ring(3);
        fabric.ties.push(Tie {
            src: at("m2", "out"),
            dst: at("m1", "in0"),
        });
        assert!(build_mrrg(&fabric, &MrrgOptions::default()).is_err());
    }

    #[test]
    fn opcode_supply_counts_units() {
        let elide = options(2, CycleBreakPolicy::BackEdges, RegisterPolicy::Elide);
        let g = build_mrrg(&unit_with_register(), &elide).unwrap();
        assert_eq!(g.opcode_supply()["add"], 2);
    }
}
