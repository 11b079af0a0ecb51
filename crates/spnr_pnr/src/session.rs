//! The place-and-route session: one solver, one variable store, one design.

use crate::checker::{verify, CheckError, Solution};
use crate::constraints::Constraint;
use crate::modeler::{declare_variables, Model, Modeler, VarKey};
use crate::optimizer::{Objective, ObjectiveState};
use serde::Serialize;
use spnr_common::{InternalError, SpnrResult, Timer};
use spnr_config::{FirstCut, OptimizeConfig};
use spnr_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use spnr_ir::Design;
use spnr_mrrg::Mrrg;
use spnr_smt::{SatResult, Solver};
use std::time::{Duration, Instant};

/// More operations need an opcode than units provide it.
pub const PIGEONHOLE: DiagnosticCode = DiagnosticCode::new(Category::Placement, 101);
/// The first solution of an optimization run.
pub const INITIAL_SOLUTION: DiagnosticCode = DiagnosticCode::new(Category::Solver, 201);
/// One binary-search probe.
pub const PROBE: DiagnosticCode = DiagnosticCode::new(Category::Solver, 202);
/// The search stopped before the bounds met.
pub const STOPPED_EARLY: DiagnosticCode = DiagnosticCode::new(Category::Solver, 203);
/// Placement was pinned to the best model.
pub const PLACEMENT_FROZEN: DiagnosticCode = DiagnosticCode::new(Category::Solver, 204);
/// Placement freezing was requested without a cutoff to trigger it.
pub const FREEZE_WITHOUT_CUTOFF: DiagnosticCode = DiagnosticCode::new(Category::Solver, 205);
/// A solver model failed independent verification.
pub const MODEL_REJECTED: DiagnosticCode = DiagnosticCode::new(Category::Routing, 301);

/// Result of the pigeonhole pre-check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Feasibility {
    /// Every opcode has at least as many capable units as operations.
    Feasible,
    /// `opcode` is demanded by more operations than units support it.
    Infeasible {
        /// The first oversubscribed opcode.
        opcode: String,
        /// Operations with that opcode.
        demand: usize,
        /// Units supporting it.
        supply: usize,
    },
}

/// Knobs of one optimization run.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeOptions {
    /// Push/pop probe bounds on one solver instead of rebuilding.
    pub incremental: bool,
    /// Relative gap at which the search stops.
    pub cutoff: Option<f64>,
    /// Pin placement at the first cutoff and keep optimizing routing.
    pub freeze_placement: bool,
    /// Cutoff in force after freezing.
    pub final_cutoff: f64,
    /// First probe policy.
    pub first_cut: FirstCut,
    /// Probe budget.
    pub max_iterations: Option<u32>,
    /// Wall-clock budget, checked between solver calls.
    pub time_budget: Option<Duration>,
    /// Verify every satisfying model.
    pub check_models: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self::from(&OptimizeConfig::default())
    }
}

impl From<&OptimizeConfig> for OptimizeOptions {
    fn from(config: &OptimizeConfig) -> Self {
        Self {
            incremental: config.incremental,
            cutoff: config.cutoff,
            freeze_placement: config.freeze_placement,
            final_cutoff: config.final_cutoff,
            first_cut: config.first_cut,
            max_iterations: config.max_iterations,
            time_budget: config.time_budget_secs.map(Duration::from_secs_f64),
            check_models: config.check_models,
        }
    }
}

/// What an optimization run achieved.
#[derive(Clone, Debug, Default)]
pub struct OptimizeOutcome {
    /// Whether any mapping exists.
    pub sat: bool,
    /// Proven lower bound on the objective over every placement.
    ///
    /// Probes made after placement was frozen never raise it.
    pub lower: u64,
    /// Objective of the best model.
    pub upper: u64,
    /// `upper` has met `lower`.
    pub proven_optimal: bool,
    /// Placement was pinned during the run.
    pub frozen: bool,
    /// Lower bound for the frozen placement only, if one was frozen.
    pub frozen_lower: Option<u64>,
    /// Binary-search probes made.
    pub iterations: u32,
    /// Search window `(floor, upper)` after the first solve and after every
    /// probe. Before freezing the floor is `lower`; after, `frozen_lower`.
    pub history: Vec<(u64, u64)>,
    /// The best model.
    pub model: Option<Model>,
}

/// Accumulated wall-clock time of one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Timings {
    /// Declaring variables and generating constraints.
    pub build: Duration,
    /// Inside the SAT solver.
    pub solve: Duration,
}

/// Owns the solver state for mapping one design onto one resource graph.
pub struct PnrSession<'a> {
    mrrg: &'a Mrrg,
    design: &'a Design,
    sink: &'a DiagnosticSink,
    solver: Solver,
    modeler: Modeler,
    build_timer: Timer,
    solve_timer: Timer,
    solver_calls: u32,
    asserted: Vec<Constraint>,
}

impl<'a> PnrSession<'a> {
    /// Creates a session with an empty solver.
    pub fn new(mrrg: &'a Mrrg, design: &'a Design, sink: &'a DiagnosticSink) -> Self {
        Self {
            mrrg,
            design,
            sink,
            solver: Solver::new(),
            modeler: Modeler::new(),
            build_timer: Timer::new(),
            solve_timer: Timer::new(),
            solver_calls: 0,
            asserted: Vec::new(),
        }
    }

    /// Compares per-opcode demand with supply without calling the solver.
    ///
    /// A duplicable operation still needs a unit of its own, so it counts
    /// like any other.
    pub fn attest(&self) -> Feasibility {
        let supply = self.mrrg.opcode_supply();
        for (opcode, demand) in self.design.opcode_counts() {
            let supply = supply.get(opcode).copied().unwrap_or(0);
            if demand > supply {
                self.sink.emit(
                    Diagnostic::error(
                        PIGEONHOLE,
                        format!(
                            "{demand} operations need opcode `{opcode}` but only {supply} units support it"
                        ),
                    )
                    .with_subject(opcode)
                    .with_help("add units supporting this opcode or use more contexts"),
                );
                return Feasibility::Infeasible {
                    opcode: opcode.to_string(),
                    demand,
                    supply,
                };
            }
        }
        Feasibility::Feasible
    }

    /// Declares every placement and routing variable.
    pub fn declare_variables(&mut self) -> SpnrResult<()> {
        self.build_timer.start();
        let result = declare_variables(self.mrrg, self.design, &mut self.modeler, &mut self.solver);
        self.build_timer.stop();
        result
    }

    /// Generates and asserts the given constraint families.
    pub fn assert_constraints(&mut self, constraints: &[Constraint]) -> SpnrResult<()> {
        self.build_timer.start();
        let result = self.generate(constraints);
        self.build_timer.stop();
        for &c in constraints {
            if !self.asserted.contains(&c) {
                self.asserted.push(c);
            }
        }
        result
    }

    fn generate(&mut self, constraints: &[Constraint]) -> SpnrResult<()> {
        for &c in constraints {
            let formula = c.generate(self.mrrg, self.design, &mut self.modeler, &mut self.solver)?;
            self.solver.assert(formula);
        }
        Ok(())
    }

    /// Checks satisfiability of everything asserted so far.
    pub fn solve(&mut self) -> SpnrResult<SatResult> {
        self.solver_calls += 1;
        self.solve_timer.start();
        let result = self.solver.check_sat();
        self.solve_timer.stop();
        Ok(result?)
    }

    /// Snapshots the last satisfying assignment.
    pub fn extract_model(&self) -> SpnrResult<Model> {
        self.modeler.extract_model(&self.solver)
    }

    /// Verifies a model against the resource graph and design.
    pub fn verify(&self, model: &Model) -> Result<Solution, CheckError> {
        verify(self.mrrg, self.design, model)
    }

    /// Solver calls made so far.
    pub fn solver_calls(&self) -> u32 {
        self.solver_calls
    }

    /// Time spent building and solving.
    pub fn timings(&self) -> Timings {
        Timings {
            build: self.build_timer.total(),
            solve: self.solve_timer.total(),
        }
    }

    /// Verifies `model`, reporting a failure as an internal error.
    fn check(&self, model: &Model, options: &OptimizeOptions) -> SpnrResult<()> {
        if !options.check_models {
            return Ok(());
        }
        self.verify(model).map(|_| ()).map_err(|e| {
            self.sink.emit(Diagnostic::error(
                MODEL_REJECTED,
                format!("solver model is not a legal mapping: {e}"),
            ));
            InternalError::new(format!("solver model failed verification: {e}"))
        })
    }

    /// Starts over with a fresh solver holding the constraints, the
    /// objective and any pinned placement.
    fn rebuild(
        &mut self,
        objective: &Objective,
        constraints: &[Constraint],
        pins: &[(VarKey, bool)],
    ) -> SpnrResult<ObjectiveState> {
        self.solver.reset();
        self.modeler.reset();
        self.declare_variables()?;
        self.build_timer.start();
        let state = self.build_objective(objective, constraints, pins);
        self.build_timer.stop();
        state
    }

    fn build_objective(
        &mut self,
        objective: &Objective,
        constraints: &[Constraint],
        pins: &[(VarKey, bool)],
    ) -> SpnrResult<ObjectiveState> {
        self.generate(constraints)?;
        let (defined, state) =
            objective.init(self.mrrg, self.design, &mut self.modeler, &mut self.solver)?;
        self.solver.assert(defined);
        self.pin(pins)?;
        Ok(state)
    }

    fn pin(&mut self, pins: &[(VarKey, bool)]) -> SpnrResult<()> {
        for &(key, value) in pins {
            let bit = self.modeler.bit(key)?;
            self.solver.assert(if value { bit } else { !bit });
        }
        Ok(())
    }

    /// Solves under the window `[lower, upper)` and returns the model if SAT.
    fn probe(
        &mut self,
        objective: &Objective,
        state: &ObjectiveState,
        lower: u64,
        upper: u64,
    ) -> SpnrResult<Option<Model>> {
        let window = objective.limit(state, &mut self.solver, lower, upper)?;
        self.solver.assert(window);
        match self.solve()? {
            SatResult::Sat => Ok(Some(self.extract_model()?)),
            SatResult::Unsat => Ok(None),
        }
    }

    /// Minimizes the objective by binary search over its value.
    ///
    /// The run starts from a fresh solver holding the families asserted so
    /// far, or all of them if none were. Every satisfying model tightens the
    /// upper bound to its path-based score; every unsatisfiable probe at `b`
    /// raises the search floor to `b + 1`. Once placement is frozen the
    /// floor only bounds that placement, so `lower` stays where it was.
    pub fn optimize(
        &mut self,
        objective: &Objective,
        options: &OptimizeOptions,
    ) -> SpnrResult<OptimizeOutcome> {
        let constraints = if self.asserted.is_empty() {
            Constraint::ALL.to_vec()
        } else {
            self.asserted.clone()
        };
        if options.freeze_placement && options.cutoff.is_none() {
            self.sink.emit(
                Diagnostic::warning(
                    FREEZE_WITHOUT_CUTOFF,
                    "placement freezing has no effect without a cutoff",
                )
                .with_help("set `optimize.cutoff`"),
            );
        }
        let started = Instant::now();

        let mut state = self.rebuild(objective, &constraints, &[])?;
        let Some(mut best) = self.probe_all()? else {
            return Ok(OptimizeOutcome::default());
        };
        self.check(&best, options)?;
        let mut upper = objective.eval(self.mrrg, self.design, &best)?;
        let mut lower = 0;
        let mut floor = 0;
        let mut history = vec![(floor, upper)];
        self.sink.emit(Diagnostic::note(
            INITIAL_SOLUTION,
            format!("initial solution uses {upper} of {} counted nodes", state.counted()),
        ));

        let mut cutoff = options.cutoff;
        let mut pins: Vec<(VarKey, bool)> = Vec::new();
        let mut frozen = false;
        let mut iterations = 0u32;
        while floor < upper {
            if let Some(c) = cutoff {
                if upper == 0 || (upper - floor) as f64 / upper as f64 <= c {
                    if options.freeze_placement && !frozen {
                        pins = self.placement_pins(&best);
                        if options.incremental {
                            self.pin(&pins)?;
                        }
                        frozen = true;
                        cutoff = Some(options.final_cutoff);
                        self.sink.emit(Diagnostic::note(
                            PLACEMENT_FROZEN,
                            format!(
                                "placement frozen at bounds [{lower}, {upper}]; \
                                 later lower bounds hold for this placement only"
                            ),
                        ));
                        continue;
                    }
                    self.stopped_early(floor, upper, "cutoff reached");
                    break;
                }
            }
            if options.max_iterations.is_some_and(|max| iterations >= max) {
                self.stopped_early(floor, upper, "iteration budget spent");
                break;
            }
            if options.time_budget.is_some_and(|budget| started.elapsed() >= budget) {
                self.stopped_early(floor, upper, "time budget spent");
                break;
            }

            let bound = if iterations == 0 && options.first_cut == FirstCut::UpperMinusOne {
                upper - 1
            } else {
                floor + (upper - 1 - floor) / 2
            };
            iterations += 1;
            let found = if options.incremental {
                self.solver.push();
                let found = self.probe(objective, &state, floor, bound + 1);
                self.solver.pop()?;
                found?
            } else {
                state = self.rebuild(objective, &constraints, &pins)?;
                self.probe(objective, &state, floor, bound + 1)?
            };
            let verdict = match found {
                Some(model) => {
                    self.check(&model, options)?;
                    upper = upper.min(objective.eval(self.mrrg, self.design, &model)?);
                    best = model;
                    "sat"
                }
                None => {
                    floor = bound + 1;
                    if !frozen {
                        lower = floor;
                    }
                    "unsat"
                }
            };
            history.push((floor, upper));
            self.sink.emit(Diagnostic::note(
                PROBE,
                format!("probe at most {bound}: {verdict}, bounds now [{floor}, {upper}]"),
            ));
        }

        Ok(OptimizeOutcome {
            sat: true,
            lower,
            upper,
            proven_optimal: lower >= upper,
            frozen,
            frozen_lower: frozen.then_some(floor),
            iterations,
            history,
            model: Some(best),
        })
    }

    fn probe_all(&mut self) -> SpnrResult<Option<Model>> {
        match self.solve()? {
            SatResult::Sat => Ok(Some(self.extract_model()?)),
            SatResult::Unsat => Ok(None),
        }
    }

    fn placement_pins(&self, model: &Model) -> Vec<(VarKey, bool)> {
        let mut pins = Vec::new();
        for &fu in self.mrrg.functional_units() {
            for op in self.design.operations() {
                let key = VarKey::Place(fu, op.id);
                pins.push((key, model.is_set(key)));
            }
        }
        pins
    }

    fn stopped_early(&self, lower: u64, upper: u64, reason: &str) {
        self.sink.emit(Diagnostic::warning(
            STOPPED_EARLY,
            format!("optimization stopped with bounds [{lower}, {upper}]: {reason}"),
        ));
    }
}
