//! Decision variables and solved models.
//!
//! Every placement and routing decision is a one-bit solver variable keyed
//! by a [`VarKey`]. The [`Modeler`] owns the key → variable map for one
//! solver instance; [`Modeler::extract_model`] snapshots the values of every
//! key into an immutable [`Model`].

use serde::Serialize;
use spnr_common::{internal_bail, InternalError, SpnrResult};
use spnr_ir::{Design, OpId, Terminal, ValueId};
use spnr_mrrg::{Mrrg, NodeId};
use spnr_smt::{Bool, Bv, Solver};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifies one decision variable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub enum VarKey {
    /// Operation `op` is placed on functional unit `fu`.
    Place(NodeId, OpId),
    /// Node carries the net `value`.
    Route(NodeId, ValueId),
    /// Node carries `value` on its way to `terminal`.
    RouteTo(NodeId, ValueId, Terminal),
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKey::Place(n, op) => write!(f, "place[{n}, op{op}]"),
            VarKey::Route(n, v) => write!(f, "route[{n}, v{v}]"),
            VarKey::RouteTo(n, v, t) => {
                write!(f, "route_to[{n}, v{v}, op{}:{}]", t.op, t.operand)
            }
        }
    }
}

/// The variable store for one solver instance.
#[derive(Debug, Default)]
pub struct Modeler {
    vars: HashMap<VarKey, Bv>,
    anonymous: usize,
}

impl Modeler {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable of `width` bits for `key`.
    pub fn declare(&mut self, solver: &mut Solver, key: VarKey, width: usize) -> SpnrResult<Bv> {
        if self.vars.contains_key(&key) {
            internal_bail!("variable {key} declared twice");
        }
        let var = solver.fresh_bv(width);
        self.vars.insert(key, var.clone());
        Ok(var)
    }

    /// The variable declared for `key`.
    pub fn lookup(&self, key: VarKey) -> SpnrResult<&Bv> {
        self.vars
            .get(&key)
            .ok_or_else(|| InternalError::new(format!("variable {key} was never declared")))
    }

    /// The single bit of a one-bit decision variable.
    pub fn bit(&self, key: VarKey) -> SpnrResult<Bool> {
        let var = self.lookup(key)?;
        if var.width() != 1 {
            internal_bail!("variable {key} is {} bits wide, not 1", var.width());
        }
        Ok(var.bit(0))
    }

    /// Allocates an unnamed helper vector.
    pub fn fresh_anonymous(&mut self, solver: &mut Solver, width: usize) -> Bv {
        self.anonymous += 1;
        solver.fresh_bv(width)
    }

    /// Number of declared keys.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Number of anonymous helpers allocated since the last reset.
    pub fn anonymous_count(&self) -> usize {
        self.anonymous
    }

    /// Reads every declared key from the solver's current model.
    pub fn extract_model(&self, solver: &Solver) -> SpnrResult<Model> {
        let mut values = BTreeMap::new();
        for (key, var) in &self.vars {
            values.insert(*key, solver.bv_value(var)?);
        }
        Ok(Model { values })
    }

    /// Drops every declaration.
    pub fn reset(&mut self) {
        self.vars.clear();
        self.anonymous = 0;
    }
}

/// Declares the full placement and routing key set.
///
/// `Place` for every (unit, operation), `Route` for every (node, value) and
/// `RouteTo` for every (node, value, terminal), all one bit wide.
pub fn declare_variables(
    mrrg: &Mrrg,
    design: &Design,
    modeler: &mut Modeler,
    solver: &mut Solver,
) -> SpnrResult<()> {
    for &fu in mrrg.functional_units() {
        for op in design.operations() {
            modeler.declare(solver, VarKey::Place(fu, op.id), 1)?;
        }
    }
    for node in mrrg.all_nodes() {
        for value in design.values() {
            modeler.declare(solver, VarKey::Route(node, value.id), 1)?;
            for &t in &value.dsts {
                modeler.declare(solver, VarKey::RouteTo(node, value.id, t), 1)?;
            }
        }
    }
    Ok(())
}

/// An immutable snapshot of every decision variable's value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<VarKey, u64>,
}

impl Model {
    /// The value of `key`, if it was declared.
    pub fn get(&self, key: VarKey) -> Option<u64> {
        self.values.get(&key).copied()
    }

    /// Returns `true` if `key` is declared and set to 1.
    pub fn is_set(&self, key: VarKey) -> bool {
        self.get(key) == Some(1)
    }

    /// Units hosting `op`, in ID order.
    pub fn placements_of(&self, mrrg: &Mrrg, op: OpId) -> Vec<NodeId> {
        mrrg.functional_units()
            .iter()
            .copied()
            .filter(|&fu| self.is_set(VarKey::Place(fu, op)))
            .collect()
    }

    /// Every key set to a nonzero value.
    pub fn set_keys(&self) -> impl Iterator<Item = VarKey> + '_ {
        self.values
            .iter()
            .filter(|(_, &v)| v != 0)
            .map(|(k, _)| *k)
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(VarKey, u64)> for Model {
    fn from_iter<I: IntoIterator<Item = (VarKey, u64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
