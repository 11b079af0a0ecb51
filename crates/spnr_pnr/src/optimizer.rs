//! Routing-resource objective and its population-count encodings.
//!
//! The objective counts the nodes of one resource class that carry any net.
//! [`Objective::init`] builds a count term over the solver's `Route`
//! variables; [`Objective::limit`] bounds it for one binary-search probe.
//! [`Objective::eval`] scores a solved model by walking its routed paths,
//! which ignores flows that are disconnected from every source.

use crate::checker::trace_paths;
use crate::modeler::{Model, Modeler, VarKey};
use spnr_common::{InternalError, SpnrResult};
use spnr_config::{ObjectiveKind, OptimizeConfig, PopcountEncoding};
use spnr_ir::Design;
use spnr_mrrg::{Mrrg, Node, NodeId, NodeKind};
use spnr_smt::{Bool, Bv, Solver};
use std::collections::BTreeSet;

/// The node classes an objective counts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeFilter {
    /// Muxes.
    Mux,
    /// Muxes and registers.
    MuxRegister,
    /// Every node that is not a functional unit.
    Routing,
}

impl NodeFilter {
    /// Returns `true` if `node` is counted.
    pub fn matches(self, node: &Node) -> bool {
        match (self, &node.kind) {
            (NodeFilter::Mux, NodeKind::Mux) => true,
            (NodeFilter::MuxRegister, NodeKind::Mux | NodeKind::Register) => true,
            (NodeFilter::Routing, kind) => !matches!(kind, NodeKind::FunctionalUnit { .. }),
            _ => false,
        }
    }
}

impl From<ObjectiveKind> for NodeFilter {
    fn from(kind: ObjectiveKind) -> Self {
        match kind {
            ObjectiveKind::Mux => NodeFilter::Mux,
            ObjectiveKind::MuxRegister => NodeFilter::MuxRegister,
            ObjectiveKind::Routing => NodeFilter::Routing,
        }
    }
}

/// A minimization target: which nodes to count and how to encode the count.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Objective {
    /// Counted node classes.
    pub filter: NodeFilter,
    /// Population-count encoding.
    pub encoding: PopcountEncoding,
}

impl From<&OptimizeConfig> for Objective {
    fn from(config: &OptimizeConfig) -> Self {
        Self {
            filter: config.objective.into(),
            encoding: config.encoding,
        }
    }
}

/// Solver-side handle on an initialized objective.
///
/// Owned by one optimization run and tied to the solver it was built in;
/// a rebuilt solver needs a fresh `init`.
#[derive(Clone, Debug)]
pub struct ObjectiveState {
    counted: usize,
    repr: Count,
}

#[derive(Clone, Debug)]
enum Count {
    /// The count as a bitvector.
    Word(Bv),
    /// `at_least[k]` holds when at least `k` nodes are used, for `k` in `0..=n`.
    Thresholds(Vec<Bool>),
}

impl ObjectiveState {
    /// Number of counted nodes.
    pub fn counted(&self) -> usize {
        self.counted
    }
}

impl Objective {
    /// Creates an objective.
    pub fn new(filter: NodeFilter, encoding: PopcountEncoding) -> Self {
        Self { filter, encoding }
    }

    /// Nodes this objective counts, in ID order.
    pub fn counted_nodes(&self, mrrg: &Mrrg) -> Vec<NodeId> {
        mrrg.all_nodes()
            .filter(|&n| self.filter.matches(mrrg.node(n)))
            .collect()
    }

    /// Builds the count term.
    ///
    /// Returns a formula to assert alongside the placement constraints and
    /// the state later probes are bounded through.
    pub fn init(
        &self,
        mrrg: &Mrrg,
        design: &Design,
        modeler: &mut Modeler,
        solver: &mut Solver,
    ) -> SpnrResult<(Bool, ObjectiveState)> {
        let mut used = Vec::new();
        for node in self.counted_nodes(mrrg) {
            let routes = design
                .values()
                .iter()
                .map(|v| modeler.bit(VarKey::Route(node, v.id)))
                .collect::<SpnrResult<Vec<_>>>()?;
            used.push(solver.or_all(&routes));
        }
        encode(self.encoding, &used, modeler, solver)
    }

    /// A formula holding when `lower <= count < upper`.
    pub fn limit(
        &self,
        state: &ObjectiveState,
        solver: &mut Solver,
        lower: u64,
        upper: u64,
    ) -> SpnrResult<Bool> {
        if upper <= lower {
            return Ok(solver.ff());
        }
        match &state.repr {
            Count::Word(count) => {
                let width = count.width().max(bit_length(upper));
                let count = solver.bv_zero_extend(count, width - count.width());
                let lo = solver.bv_const(width, lower);
                let hi = solver.bv_const(width, upper);
                let above = solver.bv_ule(&lo, &count)?;
                let below = solver.bv_ult(&count, &hi)?;
                Ok(solver.and(above, below))
            }
            Count::Thresholds(at_least) => {
                let threshold = |k: u64| match usize::try_from(k) {
                    Ok(k) if k < at_least.len() => at_least[k],
                    _ => solver.ff(),
                };
                let above = threshold(lower);
                let reached_upper = threshold(upper);
                Ok(solver.and(above, !reached_upper))
            }
        }
    }

    /// Counted nodes used by the routed paths of `model`.
    pub fn eval(&self, mrrg: &Mrrg, design: &Design, model: &Model) -> SpnrResult<u64> {
        let paths = trace_paths(mrrg, design, model)
            .map_err(|e| InternalError::new(format!("cannot score model: {e}")))?;
        let used: BTreeSet<NodeId> = paths
            .iter()
            .flat_map(|p| p.nodes.iter().copied())
            .filter(|&n| self.filter.matches(mrrg.node(n)))
            .collect();
        Ok(used.len() as u64)
    }

    /// Counted nodes carrying any net in `model`, connected or not.
    pub fn raw_count(&self, mrrg: &Mrrg, design: &Design, model: &Model) -> u64 {
        self.counted_nodes(mrrg)
            .into_iter()
            .filter(|&n| {
                design
                    .values()
                    .iter()
                    .any(|v| model.is_set(VarKey::Route(n, v.id)))
            })
            .count() as u64
    }
}

fn bit_length(n: u64) -> usize {
    (u64::BITS - n.leading_zeros()) as usize
}

/// Encodes the population count of `bits`.
fn encode(
    encoding: PopcountEncoding,
    bits: &[Bool],
    modeler: &mut Modeler,
    solver: &mut Solver,
) -> SpnrResult<(Bool, ObjectiveState)> {
    let counted = bits.len();
    let width = bit_length(counted as u64).max(1);
    let mut pins = Vec::new();
    let sum = match encoding {
        PopcountEncoding::Shannon => {
            let state = ObjectiveState {
                counted,
                repr: Count::Thresholds(thresholds(bits, solver)),
            };
            return Ok((solver.tt(), state));
        }
        PopcountEncoding::Ite => {
            let one = solver.bv_const(width, 1);
            let zero = solver.bv_const(width, 0);
            let mut sum = zero.clone();
            for &b in bits {
                let term = solver.bv_ite(b, &one, &zero)?;
                sum = solver.bv_add(&sum, &term)?;
            }
            sum
        }
        PopcountEncoding::ZeroExtend => {
            let mut sum = solver.bv_const(width, 0);
            for &b in bits {
                let term = solver.bv_zero_extend(&Bv::from_bools(&[b]), width - 1);
                sum = solver.bv_add(&sum, &term)?;
            }
            sum
        }
        PopcountEncoding::BitHack => swar_count(bits, width, &mut pins, modeler, solver)?,
    };
    let count = modeler.fresh_anonymous(solver, width);
    pins.push(solver.bv_eq(&count, &sum)?);
    let defined = solver.and_all(&pins);
    let state = ObjectiveState {
        counted,
        repr: Count::Word(count),
    };
    Ok((defined, state))
}

/// Builds `at_least[0..=n]` with the recurrence
/// `at_least[k] |= at_least[k - 1] & x`, processing one bit at a time.
fn thresholds(bits: &[Bool], solver: &mut Solver) -> Vec<Bool> {
    let mut at_least = vec![solver.ff(); bits.len() + 1];
    at_least[0] = solver.tt();
    for (i, &x) in bits.iter().enumerate() {
        for k in (1..=i + 1).rev() {
            let carried = solver.and(at_least[k - 1], x);
            at_least[k] = solver.or(at_least[k], carried);
        }
    }
    at_least
}

/// Parallel bit count over a vector padded to a power-of-two width.
///
/// The bits are first copied into a fresh helper; the copy equalities are
/// appended to `pins`.
fn swar_count(
    bits: &[Bool],
    width: usize,
    pins: &mut Vec<Bool>,
    modeler: &mut Modeler,
    solver: &mut Solver,
) -> SpnrResult<Bv> {
    let padded = bits.len().max(1).next_power_of_two();
    let packed = modeler.fresh_anonymous(solver, bits.len());
    let mut lanes: Vec<Bool> = packed.bits().collect();
    for (i, &b) in bits.iter().enumerate() {
        pins.push(solver.iff(packed.bit(i), b));
    }
    lanes.resize(padded, solver.ff());
    let v = Bv::from_bools(&lanes);

    let shifted = solver.bv_lshr(&v, 1);
    let m1 = mask(solver, padded, 1);
    let pairs = solver.bv_and(&shifted, &m1)?;
    let mut x = solver.bv_sub(&v, &pairs)?;
    if padded >= 4 {
        let m2 = mask(solver, padded, 2);
        let low = solver.bv_and(&x, &m2)?;
        let shifted = solver.bv_lshr(&x, 2);
        let high = solver.bv_and(&shifted, &m2)?;
        x = solver.bv_add(&low, &high)?;
    }
    let mut group = 4;
    while group < padded {
        let shifted = solver.bv_lshr(&x, group);
        let summed = solver.bv_add(&x, &shifted)?;
        let m = mask(solver, padded, group);
        x = solver.bv_and(&summed, &m)?;
        group *= 2;
    }
    Ok(solver.bv_extract(&x, width - 1, 0)?)
}

/// `group` ones then `group` zeros, repeated from the least significant bit.
fn mask(solver: &Solver, width: usize, group: usize) -> Bv {
    let bits: Vec<Bool> = (0..width)
        .map(|i| solver.bool_const((i / group) % 2 == 0))
        .collect();
    Bv::from_bools(&bits)
}
