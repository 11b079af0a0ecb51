//! Programmatic fabric assembly.
//!
//! [`FabricBuilder`] is the usual way tests and generators produce fabrics.
//! Adding a functional unit also adds one operand port per unit input
//! (named `PORT-<unit>-<input>`) and ties it to that input, so callers can
//! connect routing directly to unit inputs and the tie is redirected to the
//! operand port.

use crate::error::FabricError;
use crate::types::{
    Address, Block, Fabric, Instance, InstanceKind, Location, MuxDecl, OperandPortDecl, Tie,
};
use std::collections::BTreeMap;

/// Name of the operand port generated for `unit`'s input `port`.
pub fn operand_port_name(unit: &str, port: &str) -> String {
    format!("PORT-{unit}-{port}")
}

/// Incrementally assembles a [`Fabric`].
#[derive(Debug, Default)]
pub struct FabricBuilder {
    blocks: BTreeMap<Location, Block>,
    ties: Vec<Tie>,
}

impl FabricBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn block_mut(&mut self, location: Location) -> &mut Block {
        self.blocks
            .entry(location)
            .or_insert_with(|| Block::new(location))
    }

    /// Adds a functional unit with output `out` and the given inputs.
    ///
    /// Input `i` in `inputs` is bound to operand index `i` through a fresh
    /// operand port.
    pub fn functional_unit(
        &mut self,
        location: Location,
        name: &str,
        ops: &[&str],
        inputs: &[&str],
    ) -> &mut Self {
        let block = self
            .blocks
            .entry(location)
            .or_insert_with(|| Block::new(location));
        block.instances.push(Instance {
            name: name.to_string(),
            kind: InstanceKind::FunctionalUnit,
            input_ports: inputs.iter().map(|s| s.to_string()).collect(),
            output_ports: vec!["out".to_string()],
            ops: ops.iter().map(|s| s.to_string()).collect(),
        });
        for (operand, input) in inputs.iter().enumerate() {
            let port = operand_port_name(name, input);
            block.operand_ports.push(OperandPortDecl {
                name: port.clone(),
                input_port: "in".to_string(),
                output_port: "out".to_string(),
                operand: operand as u32,
            });
            self.ties.push(Tie {
                src: Address::new(location, port, "out"),
                dst: Address::new(location, name, *input),
            });
        }
        self
    }

    /// Adds a register with ports `in` and `out`.
    pub fn register(&mut self, location: Location, name: &str) -> &mut Self {
        self.block_mut(location).instances.push(Instance {
            name: name.to_string(),
            kind: InstanceKind::Register,
            input_ports: vec!["in".to_string()],
            output_ports: vec!["out".to_string()],
            ops: Default::default(),
        });
        self
    }

    /// Adds a mux with inputs `in0..in<inputs-1>` and output `out`.
    pub fn mux(&mut self, location: Location, name: &str, inputs: usize) -> &mut Self {
        self.block_mut(location).muxes.push(MuxDecl {
            name: name.to_string(),
            input_ports: (0..inputs).map(|i| format!("in{i}")).collect(),
            output_port: "out".to_string(),
        });
        self
    }

    /// Ties `src` to `dst`.
    ///
    /// A destination naming a functional-unit input is redirected to the
    /// input of that input's operand port.
    pub fn connect(&mut self, src: Address, dst: Address) -> &mut Self {
        let dst = self.redirect(dst);
        self.ties.push(Tie { src, dst });
        self
    }

    fn redirect(&self, dst: Address) -> Address {
        let is_unit_input = self.blocks.get(&dst.location).is_some_and(|block| {
            block.instances.iter().any(|i| {
                i.name == dst.element
                    && i.kind == InstanceKind::FunctionalUnit
                    && i.input_ports.contains(&dst.port)
            })
        });
        if is_unit_input {
            Address::new(dst.location, operand_port_name(&dst.element, &dst.port), "in")
        } else {
            dst
        }
    }

    /// Finishes the fabric and validates it.
    pub fn build(self) -> Result<Fabric, FabricError> {
        let fabric = Fabric {
            blocks: self.blocks.into_values().collect(),
            ties: self.ties,
        };
        fabric.validate()?;
        Ok(fabric)
    }
}
