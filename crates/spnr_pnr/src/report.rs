//! Name-based summaries of a mapping for people and tools.

use crate::checker::Solution;
use crate::session::{OptimizeOutcome, Timings};
use serde::Serialize;
use spnr_ir::Design;
use spnr_mrrg::Mrrg;
use std::collections::BTreeMap;
use std::fmt;

/// A mapping with every ID replaced by its name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolutionReport {
    /// Operation name to the names of the units hosting it.
    pub placements: BTreeMap<String, Vec<String>>,
    /// Every routed flow.
    pub routes: Vec<RouteReport>,
    /// Distinct non-unit nodes used.
    pub routing_nodes_used: usize,
    /// Optimizer bounds, when the optimizer ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<ObjectiveReport>,
}

/// One routed flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    /// Name of the operation producing the net.
    pub net: String,
    /// Destination as `op.operand`.
    pub terminal: String,
    /// Node names from the source unit to the operand port.
    pub nodes: Vec<String>,
}

/// Final optimizer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveReport {
    /// Proven lower bound.
    pub lower: u64,
    /// Objective of the reported mapping.
    pub upper: u64,
    /// Whether the bounds met.
    pub proven_optimal: bool,
    /// Lower bound for the frozen placement, if placement was frozen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_lower: Option<u64>,
    /// Probes made.
    pub iterations: u32,
}

impl From<&OptimizeOutcome> for ObjectiveReport {
    fn from(outcome: &OptimizeOutcome) -> Self {
        Self {
            lower: outcome.lower,
            upper: outcome.upper,
            proven_optimal: outcome.proven_optimal,
            frozen_lower: outcome.frozen_lower,
            iterations: outcome.iterations,
        }
    }
}

impl SolutionReport {
    /// Resolves the names of a verified solution.
    pub fn new(mrrg: &Mrrg, design: &Design, solution: &Solution) -> Self {
        let name = |n| mrrg.node(n).name.clone();
        let placements = solution
            .placements
            .iter()
            .map(|(&op, units)| {
                (
                    design.op(op).name.clone(),
                    units.iter().map(|&u| name(u)).collect::<Vec<_>>(),
                )
            })
            .collect();
        let routes = solution
            .paths
            .iter()
            .map(|p| RouteReport {
                net: design.op(design.value(p.value).src).name.clone(),
                terminal: format!("{}.{}", design.op(p.terminal.op).name, p.terminal.operand),
                nodes: p.nodes.iter().map(|&n| name(n)).collect(),
            })
            .collect();
        Self {
            placements,
            routes,
            routing_nodes_used: solution.routing_nodes_used(mrrg),
            objective: None,
        }
    }

    /// Attaches optimizer bounds.
    pub fn with_objective(mut self, outcome: &OptimizeOutcome) -> Self {
        self.objective = Some(outcome.into());
        self
    }
}

impl fmt::Display for SolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "placement:")?;
        for (op, units) in &self.placements {
            writeln!(f, "  {op} -> {}", units.join(", "))?;
        }
        writeln!(f, "routing:")?;
        for route in &self.routes {
            writeln!(f, "  {} -> {}: {}", route.net, route.terminal, route.nodes.join(" > "))?;
        }
        write!(f, "routing nodes used: {}", self.routing_nodes_used)?;
        if let Some(obj) = &self.objective {
            let state = if obj.proven_optimal { "optimal" } else { "bounded" };
            write!(
                f,
                "\nobjective: {} ({state}, lower bound {}, {} probes)",
                obj.upper, obj.lower, obj.iterations
            )?;
            if let Some(frozen) = obj.frozen_lower {
                write!(f, "\nfrozen placement lower bound: {frozen}")?;
            }
        }
        Ok(())
    }
}

/// Formats session timings as `build 1.234s, solve 0.567s`.
pub fn format_timings(timings: &Timings) -> String {
    format!(
        "build {:.3}s, solve {:.3}s",
        timings.build.as_secs_f64(),
        timings.solve.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn display_lists_everything() {
        let report = SolutionReport {
            placements: [("add0".to_string(), vec!["FunctionalUnit_alu_0_0_0".to_string()])]
                .into_iter()
                .collect(),
            routes: vec![RouteReport {
                net: "c".into(),
                terminal: "add0.1".into(),
                nodes: vec!["FunctionalUnit_k_0_0_0".into(), "Mux_m_0_0_0".into()],
            }],
            routing_nodes_used: 1,
            objective: Some(ObjectiveReport {
                lower: 1,
                upper: 1,
                proven_optimal: true,
                frozen_lower: None,
                iterations: 1,
            }),
        };
        let text = report.to_string();
        assert!(text.contains("add0 -> FunctionalUnit_alu_0_0_0"));
        assert!(text.contains("c -> add0.1: FunctionalUnit_k_0_0_0 > Mux_m_0_0_0"));
        assert!(text.ends_with("objective: 1 (optimal, lower bound 1, 1 probes)"));
    }

    #[test]
    fn frozen_bound_is_reported_separately() {
        let report = SolutionReport {
            objective: Some(ObjectiveReport {
                lower: 4,
                upper: 8,
                proven_optimal: false,
                frozen_lower: Some(8),
                iterations: 5,
            }),
            ..SolutionReport::default()
        };
        let text = report.to_string();
        assert!(text.contains("objective: 8 (bounded, lower bound 4, 5 probes)"));
        assert!(text.ends_with("frozen placement lower bound: 8"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["objective"]["lower"], 4);
        assert_eq!(json["objective"]["frozen_lower"], 8);
    }

    #[test]
    fn json_omits_missing_objective() {
        let json = serde_json::to_value(SolutionReport::default()).unwrap();
        assert!(json.get("objective").is_none());
        assert_eq!(json["routing_nodes_used"], 0);
    }

    #[test]
    fn timings_format() {
        let t = Timings {
            build: Duration::from_millis(1500),
            solve: Duration::from_millis(20),
        };
        assert_eq!(format_timings(&t), "build 1.500s, solve 0.020s");
    }
}
