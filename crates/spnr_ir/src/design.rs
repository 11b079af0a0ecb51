//! Operations, values and the design container.

use crate::error::DesignError;
use crate::ids::{OpId, ValueId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One destination of a value: an operation and the operand it feeds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Terminal {
    /// Destination operation.
    pub op: OpId,
    /// Operand index on the destination.
    pub operand: u32,
}

/// A dataflow operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    /// Dense ID.
    pub id: OpId,
    /// Unique name.
    pub name: String,
    /// Opcode a functional unit must support to host this operation.
    pub opcode: String,
    /// Whether the operation may be placed on several units at once.
    pub duplicate: bool,
    /// The value this operation produces, if anything consumes it.
    pub output: Option<ValueId>,
    /// Input values keyed by operand index.
    pub inputs: BTreeMap<u32, ValueId>,
}

/// A net: one source operation fanning out to one or more terminals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Value {
    /// Dense ID.
    pub id: ValueId,
    /// Producing operation.
    pub src: OpId,
    /// Destinations, sorted.
    pub dsts: Vec<Terminal>,
}

/// A program graph.
///
/// Operations are ordered by name and values by the name of their source,
/// so IDs are deterministic for a given input.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Design {
    operations: Vec<Operation>,
    values: Vec<Value>,
}

impl Design {
    /// Builds a design from operation declarations and ties.
    ///
    /// `operations` maps operation names to opcodes; each tie is
    /// `(source, destination, operand)`. Ties sharing a source form one
    /// value. Operations whose opcode is in `duplicate_opcodes` are marked
    /// duplicable. Repeated identical ties are merged.
    pub fn new(
        operations: &BTreeMap<String, String>,
        ties: &[(String, String, u32)],
        duplicate_opcodes: &BTreeSet<String>,
    ) -> Result<Self, DesignError> {
        let mut ops: Vec<Operation> = operations
            .iter()
            .enumerate()
            .map(|(i, (name, opcode))| Operation {
                id: OpId::from_index(i),
                name: name.clone(),
                opcode: opcode.clone(),
                duplicate: duplicate_opcodes.contains(opcode),
                output: None,
                inputs: BTreeMap::new(),
            })
            .collect();
        let index: BTreeMap<&str, OpId> = ops.iter().map(|op| (op.name.as_str(), op.id)).collect();
        let lookup = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| DesignError::UnknownOperation(name.to_string()))
        };

        let mut fanout: BTreeMap<OpId, BTreeSet<Terminal>> = BTreeMap::new();
        let mut drivers: BTreeMap<Terminal, OpId> = BTreeMap::new();
        for (src, dst, operand) in ties {
            let src = lookup(src)?;
            let dst = lookup(dst)?;
            let terminal = Terminal {
                op: dst,
                operand: *operand,
            };
            if let Some(prev) = drivers.insert(terminal, src) {
                if prev != src {
                    return Err(DesignError::OperandBoundTwice {
                        op: ops[dst.index()].name.clone(),
                        operand: *operand,
                    });
                }
            }
            fanout.entry(src).or_default().insert(terminal);
        }

        let mut values = Vec::with_capacity(fanout.len());
        for (src, dsts) in fanout {
            let id = ValueId::from_index(values.len());
            ops[src.index()].output = Some(id);
            for t in &dsts {
                ops[t.op.index()].inputs.insert(t.operand, id);
            }
            values.push(Value {
                id,
                src,
                dsts: dsts.into_iter().collect(),
            });
        }

        Ok(Self {
            operations: ops,
            values,
        })
    }

    /// All operations in ID order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// All values in ID order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The operation with the given ID.
    pub fn op(&self, id: OpId) -> &Operation {
        &self.operations[id.index()]
    }

    /// The value with the given ID.
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    /// Finds an operation by name.
    pub fn op_by_name(&self, name: &str) -> Option<&Operation> {
        self.operations
            .binary_search_by(|op| op.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.operations[i])
    }

    /// Number of operations per opcode.
    pub fn opcode_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.opcode.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
