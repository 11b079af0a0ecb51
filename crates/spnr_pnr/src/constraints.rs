//! Placement and routing constraint families.
//!
//! Each [`Constraint`] variant builds one boolean formula over the decision
//! variables declared by [`declare_variables`](crate::declare_variables).
//! The session conjoins the formulas of the families it is asked to assert.
//!
//! "At most one" and "exactly one" over N booleans pack the booleans into a
//! fresh N-bit helper `v` and test `v & (v - 1) == 0`, adding `v != 0` for
//! exactly-one. This stays linear in N where pairwise exclusion is
//! quadratic.

use crate::modeler::{Modeler, VarKey};
use spnr_common::{internal_bail, SpnrResult};
use spnr_ir::{Design, Terminal};
use spnr_mrrg::{Mrrg, Node, NodeId, NodeKind};
use spnr_smt::{Bool, Solver};

/// One family of placement/routing constraints.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Constraint {
    /// Every operation is placed: exactly once, or at least once if duplicable.
    OpPlacement,
    /// Every functional unit hosts at most one operation.
    PeExclusivity,
    /// Operations sit only on units supporting their opcode.
    PeLegality,
    /// Every node carries at most one net.
    RouteExclusivity,
    /// A node carries a net exactly when it carries it toward some terminal.
    RoutingResourceUsage,
    /// Nets originate where their source operation is placed.
    InitValue,
    /// Nets end at the operand port of the unit hosting the destination.
    PortPlacement,
    /// A routing node carrying a flow has exactly one fan-in carrying it.
    InputConnectivity,
    /// A node carrying a flow has exactly one fan-out carrying it.
    OutputConnectivity,
}

impl Constraint {
    /// Every family, in the order they are normally asserted.
    pub const ALL: [Constraint; 9] = [
        Constraint::OpPlacement,
        Constraint::PeExclusivity,
        Constraint::PeLegality,
        Constraint::RouteExclusivity,
        Constraint::InitValue,
        Constraint::PortPlacement,
        Constraint::InputConnectivity,
        Constraint::OutputConnectivity,
        Constraint::RoutingResourceUsage,
    ];

    /// Snake-case family name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Constraint::OpPlacement => "op_placement",
            Constraint::PeExclusivity => "pe_exclusivity",
            Constraint::PeLegality => "pe_legality",
            Constraint::RouteExclusivity => "route_exclusivity",
            Constraint::RoutingResourceUsage => "routing_resource_usage",
            Constraint::InitValue => "init_value",
            Constraint::PortPlacement => "port_placement",
            Constraint::InputConnectivity => "input_connectivity",
            Constraint::OutputConnectivity => "output_connectivity",
        }
    }

    /// Builds the formula for this family.
    pub fn generate(
        self,
        mrrg: &Mrrg,
        design: &Design,
        modeler: &mut Modeler,
        solver: &mut Solver,
    ) -> SpnrResult<Bool> {
        let mut cx = Cx {
            mrrg,
            design,
            modeler,
            solver,
            terms: Vec::new(),
        };
        match self {
            Constraint::OpPlacement => cx.op_placement()?,
            Constraint::PeExclusivity => cx.pe_exclusivity()?,
            Constraint::PeLegality => cx.pe_legality()?,
            Constraint::RouteExclusivity => cx.route_exclusivity()?,
            Constraint::RoutingResourceUsage => cx.routing_resource_usage()?,
            Constraint::InitValue => cx.init_value()?,
            Constraint::PortPlacement => cx.port_placement()?,
            Constraint::InputConnectivity => cx.connectivity(Direction::Input)?,
            Constraint::OutputConnectivity => cx.connectivity(Direction::Output)?,
        }
        Ok(cx.finish())
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

/// Accumulates the conjuncts of one family.
struct Cx<'a> {
    mrrg: &'a Mrrg,
    design: &'a Design,
    modeler: &'a mut Modeler,
    solver: &'a mut Solver,
    terms: Vec<Bool>,
}

impl Cx<'_> {
    fn var(&self, key: VarKey) -> SpnrResult<Bool> {
        self.modeler.bit(key)
    }

    fn push(&mut self, term: Bool) {
        self.terms.push(term);
    }

    fn finish(self) -> Bool {
        self.solver.and_all(&self.terms)
    }

    /// Packs `bits` into a fresh helper, pushes the packing equalities, and
    /// returns the "at most one" (or "exactly one") condition on the helper.
    fn one_hot(&mut self, bits: &[Bool], strict: bool) -> SpnrResult<Bool> {
        if bits.is_empty() {
            return Ok(self.solver.bool_const(!strict));
        }
        let packed = self.modeler.fresh_anonymous(self.solver, bits.len());
        for (i, &b) in bits.iter().enumerate() {
            let eq = self.solver.iff(packed.bit(i), b);
            self.push(eq);
        }
        let one = self.solver.bv_const(bits.len(), 1);
        let dec = self.solver.bv_sub(&packed, &one)?;
        let masked = self.solver.bv_and(&packed, &dec)?;
        let at_most_one = self.solver.bv_is_zero(&masked);
        if strict {
            let nonzero = !self.solver.bv_is_zero(&packed);
            Ok(self.solver.and(at_most_one, nonzero))
        } else {
            Ok(at_most_one)
        }
    }

    fn op_placement(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for op in design.operations() {
            let bits = mrrg
                .functional_units()
                .iter()
                .map(|&fu| self.var(VarKey::Place(fu, op.id)))
                .collect::<SpnrResult<Vec<_>>>()?;
            let placed = if op.duplicate {
                self.solver.or_all(&bits)
            } else {
                self.one_hot(&bits, true)?
            };
            self.push(placed);
        }
        Ok(())
    }

    fn pe_exclusivity(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for &fu in mrrg.functional_units() {
            let bits = design
                .operations()
                .iter()
                .map(|op| self.var(VarKey::Place(fu, op.id)))
                .collect::<SpnrResult<Vec<_>>>()?;
            let c = self.one_hot(&bits, false)?;
            self.push(c);
        }
        Ok(())
    }

    fn pe_legality(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for &fu in mrrg.functional_units() {
            for op in design.operations() {
                if !supports(mrrg.node(fu), &op.opcode) {
                    let p = self.var(VarKey::Place(fu, op.id))?;
                    self.push(!p);
                }
            }
        }
        Ok(())
    }

    fn route_exclusivity(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for node in mrrg.all_nodes() {
            let bits = design
                .values()
                .iter()
                .map(|v| self.var(VarKey::Route(node, v.id)))
                .collect::<SpnrResult<Vec<_>>>()?;
            let c = self.one_hot(&bits, false)?;
            self.push(c);
        }
        Ok(())
    }

    fn routing_resource_usage(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for node in mrrg.all_nodes() {
            for value in design.values() {
                let route = self.var(VarKey::Route(node, value.id))?;
                let flows = value
                    .dsts
                    .iter()
                    .map(|&t| self.var(VarKey::RouteTo(node, value.id, t)))
                    .collect::<SpnrResult<Vec<_>>>()?;
                let any = self.solver.or_all(&flows);
                let c = self.solver.iff(route, any);
                self.push(c);
            }
        }
        Ok(())
    }

    /// A net leaves every unit hosting its source.
    ///
    /// On a unit that cannot run the source opcode every route variable of
    /// the net is zero. Otherwise a duplicable source ties the per-net
    /// variable to placement, and an exclusive source ties every per-terminal
    /// variable to placement.
    fn init_value(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for &fu in mrrg.functional_units() {
            let unit = mrrg.node(fu);
            for op in design.operations() {
                let Some(vid) = op.output else { continue };
                let value = design.value(vid);
                if !supports(unit, &op.opcode) {
                    let route = self.var(VarKey::Route(fu, vid))?;
                    self.push(!route);
                    for &t in &value.dsts {
                        let flow = self.var(VarKey::RouteTo(fu, vid, t))?;
                        self.push(!flow);
                    }
                    continue;
                }
                let place = self.var(VarKey::Place(fu, op.id))?;
                if op.duplicate {
                    let route = self.var(VarKey::Route(fu, vid))?;
                    let c = self.solver.iff(route, place);
                    self.push(c);
                } else {
                    for &t in &value.dsts {
                        let flow = self.var(VarKey::RouteTo(fu, vid, t))?;
                        let c = self.solver.iff(flow, place);
                        self.push(c);
                    }
                }
            }
        }
        Ok(())
    }

    /// Every input of a placed operation arrives on the matching operand port.
    ///
    /// A terminal's flow never enters an operand port bound to a different
    /// operand, so every flow ends on the port it is meant for.
    fn port_placement(&mut self) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        for &fu in mrrg.functional_units() {
            let unit = mrrg.node(fu);
            for op in design.operations() {
                let legal = supports(unit, &op.opcode);
                let place = self.var(VarKey::Place(fu, op.id))?;
                for (&operand, &vid) in &op.inputs {
                    let terminal = Terminal { op: op.id, operand };
                    if !design.value(vid).dsts.contains(&terminal) {
                        internal_bail!("value {vid} does not list terminal {terminal:?}");
                    }
                    for (&other, &port) in operand_ports(unit) {
                        if other != operand {
                            let stray = self.var(VarKey::RouteTo(port, vid, terminal))?;
                            self.push(!stray);
                        }
                    }
                    let Some(port) = unit.operand_port(operand) else {
                        if legal {
                            self.push(!place);
                        }
                        continue;
                    };
                    let flow = self.var(VarKey::RouteTo(port, vid, terminal))?;
                    let c = if legal {
                        self.solver.iff(flow, place)
                    } else {
                        !flow
                    };
                    self.push(c);
                }
            }
        }
        Ok(())
    }

    /// Flow continuity: a node carrying `(value, terminal)` has exactly one
    /// neighbor on the given side also carrying it.
    ///
    /// Inputs are checked on routing nodes only, since flows start at units.
    /// Outputs are checked everywhere except operand ports, where flows end.
    fn connectivity(&mut self, direction: Direction) -> SpnrResult<()> {
        let (mrrg, design) = (self.mrrg, self.design);
        let nodes: Vec<&Node> = match direction {
            Direction::Input => mrrg
                .routing_nodes()
                .iter()
                .map(|&n| mrrg.node(n))
                .collect(),
            Direction::Output => mrrg
                .all_nodes()
                .map(|n| mrrg.node(n))
                .filter(|n| !n.is_operand_port())
                .collect(),
        };
        for node in nodes {
            let neighbors = match direction {
                Direction::Input => node.fanin_nodes(),
                Direction::Output => node.fanout_nodes(),
            };
            for value in design.values() {
                for &t in &value.dsts {
                    let flow = self.var(VarKey::RouteTo(node.id, value.id, t))?;
                    let bits = neighbors
                        .iter()
                        .map(|&n| self.var(VarKey::RouteTo(n, value.id, t)))
                        .collect::<SpnrResult<Vec<_>>>()?;
                    let exactly_one = self.one_hot(&bits, true)?;
                    let c = self.solver.implies(flow, exactly_one);
                    self.push(c);
                }
            }
        }
        Ok(())
    }
}

fn supports(unit: &Node, opcode: &str) -> bool {
    unit.ops().is_some_and(|ops| ops.contains(opcode))
}

fn operand_ports(unit: &Node) -> impl Iterator<Item = (&u32, &NodeId)> {
    match &unit.kind {
        NodeKind::FunctionalUnit { operands, .. } => Some(operands.iter()),
        _ => None,
    }
    .into_iter()
    .flatten()
}
