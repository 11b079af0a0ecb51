//! Configuration types deserialized from `spnr.toml`.

use serde::{Deserialize, Serialize};

/// The top-level run configuration parsed from `spnr.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PnrConfig {
    /// Resource-graph construction settings.
    #[serde(default)]
    pub mrrg: MrrgConfig,
    /// Program-graph settings.
    #[serde(default)]
    pub design: DesignConfig,
    /// Optimizer settings.
    #[serde(default)]
    pub optimize: OptimizeConfig,
}

/// Settings for building the modulo routing-resource graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MrrgConfig {
    /// Number of time-multiplexed contexts the fabric is replicated over.
    #[serde(default = "default_contexts")]
    pub contexts: u32,
    /// How combinational mux-to-mux cycles are broken.
    #[serde(default)]
    pub cycle_break: CycleBreakPolicy,
    /// What happens to registers when there is a single context.
    #[serde(default)]
    pub registers: RegisterPolicy,
}

fn default_contexts() -> u32 {
    1
}

impl Default for MrrgConfig {
    fn default() -> Self {
        Self {
            contexts: default_contexts(),
            cycle_break: CycleBreakPolicy::default(),
            registers: RegisterPolicy::default(),
        }
    }
}

/// Where tie nodes are inserted between muxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleBreakPolicy {
    /// Split only the back edges found by depth-first search over the mux subgraph.
    #[default]
    BackEdges,
    /// Split every mux-to-mux edge.
    AllMuxEdges,
    /// Insert no tie nodes.
    None,
}

/// Register handling when the fabric has a single context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegisterPolicy {
    /// Splice each register's driver directly to its consumers and drop the register.
    #[default]
    Elide,
    /// Keep the register as an identity pass-through within the same context.
    Retain,
}

/// Program-graph settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignConfig {
    /// Opcodes whose operations may be materialized on several units at once.
    #[serde(default)]
    pub duplicate_opcodes: Vec<String>,
}

/// Which class of routing resources the optimizer minimizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectiveKind {
    /// Muxes only.
    Mux,
    /// Muxes and registers.
    #[default]
    MuxRegister,
    /// Every non-functional-unit node.
    Routing,
}

/// The bitvector encoding used for the population count of used nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopcountEncoding {
    /// Sum of if-then-else terms.
    Ite,
    /// Sum of zero-extended single bits.
    ZeroExtend,
    /// Parallel SWAR bit counting with grouped masks.
    #[default]
    BitHack,
    /// Threshold network of "at least n used" terms.
    Shannon,
}

/// How the first bound of the binary search is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstCut {
    /// Probe one below the current upper bound.
    #[default]
    UpperMinusOne,
    /// Probe the midpoint like every later iteration.
    Midpoint,
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeConfig {
    /// Whether to minimize routing resources after the first solution.
    #[serde(default)]
    pub enabled: bool,
    /// Resource class to minimize.
    #[serde(default)]
    pub objective: ObjectiveKind,
    /// Population-count encoding.
    #[serde(default)]
    pub encoding: PopcountEncoding,
    /// Reuse one solver with push/pop instead of rebuilding every iteration.
    #[serde(default)]
    pub incremental: bool,
    /// Stop once `(upper - lower) / upper` drops to this fraction.
    #[serde(default)]
    pub cutoff: Option<f64>,
    /// Pin placement to the best model at the first cutoff and keep optimizing routing.
    #[serde(default)]
    pub freeze_placement: bool,
    /// Cutoff used after placement has been frozen.
    #[serde(default)]
    pub final_cutoff: f64,
    /// First probe policy.
    #[serde(default)]
    pub first_cut: FirstCut,
    /// Upper limit on solver calls made by the search loop.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Wall-clock budget in seconds, checked between solver calls.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
    /// Run the model checker on every satisfying model.
    #[serde(default = "default_true")]
    pub check_models: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            objective: ObjectiveKind::default(),
            encoding: PopcountEncoding::default(),
            incremental: false,
            cutoff: None,
            freeze_placement: false,
            final_cutoff: 0.0,
            first_cut: FirstCut::default(),
            max_iterations: None,
            time_budget_secs: None,
            check_models: default_true(),
        }
    }
}
