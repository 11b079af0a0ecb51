//! Structural validation of a [`Fabric`].

use crate::error::FabricError;
use crate::types::{Address, Element, Fabric, InstanceKind, Location};
use std::collections::{BTreeMap, BTreeSet, HashSet};

impl Fabric {
    /// Checks that the fabric is well formed.
    ///
    /// Block locations and element names are unique, every tie connects an
    /// existing output port to an existing input port, every input has at
    /// most one driver, and functional-unit inputs are driven only by operand
    /// ports with distinct operand indices. Undriven inputs are allowed.
    pub fn validate(&self) -> Result<(), FabricError> {
        let mut locations = HashSet::new();
        for block in &self.blocks {
            if !locations.insert(block.location) {
                return Err(FabricError::DuplicateLocation(block.location));
            }
            let mut names = HashSet::new();
            for element in block.elements() {
                if !names.insert(element.name()) {
                    return Err(FabricError::DuplicateName {
                        location: block.location,
                        name: element.name().to_string(),
                    });
                }
                check_port_overlap(block.location, &element)?;
            }
        }

        let mut driven: HashSet<&Address> = HashSet::new();
        let mut unit_operands: BTreeMap<(Location, &str), BTreeSet<u32>> = BTreeMap::new();
        for tie in &self.ties {
            let src = self
                .resolve(&tie.src)
                .ok_or_else(|| FabricError::UnknownElement(tie.src.clone()))?;
            if !src.has_output(&tie.src.port) {
                return Err(FabricError::BadPort(tie.src.clone()));
            }
            let dst = self
                .resolve(&tie.dst)
                .ok_or_else(|| FabricError::UnknownElement(tie.dst.clone()))?;
            if !dst.has_input(&tie.dst.port) {
                return Err(FabricError::BadPort(tie.dst.clone()));
            }
            if !driven.insert(&tie.dst) {
                return Err(FabricError::MultipleDrivers(tie.dst.clone()));
            }

            if let Element::Instance(inst) = dst {
                if inst.kind == InstanceKind::FunctionalUnit {
                    let Element::OperandPort(port) = src else {
                        return Err(FabricError::UnitInputNotFromOperandPort(tie.dst.clone()));
                    };
                    let seen = unit_operands
                        .entry((tie.dst.location, inst.name.as_str()))
                        .or_default();
                    if !seen.insert(port.operand) {
                        return Err(FabricError::DuplicateOperand {
                            address: tie.dst.clone(),
                            operand: port.operand,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_port_overlap(location: Location, element: &Element<'_>) -> Result<(), FabricError> {
    let inputs: HashSet<&str> = element.input_ports().into_iter().collect();
    for port in element.output_ports() {
        if inputs.contains(port) {
            return Err(FabricError::PortOverlap {
                location,
                name: element.name().to_string(),
                port: port.to_string(),
            });
        }
    }
    Ok(())
}
