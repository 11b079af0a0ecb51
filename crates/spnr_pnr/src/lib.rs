//! SMT-based placement and routing of dataflow graphs onto CGRAs.
//!
//! The crate encodes "map this [`Design`] onto this [`Mrrg`]" as a
//! bitvector satisfiability problem, solves it, and checks the answer.
//!
//! # Pipeline
//!
//! 1. **Attest**: per-opcode pigeonhole check, no solver involved
//! 2. **Declare**: one-bit `Place`, `Route` and `RouteTo` variables
//! 3. **Constrain**: the nine [`Constraint`] families
//! 4. **Solve**, or **optimize** routing-resource usage by binary search
//! 5. **Verify**: independent walk of every routed flow
//!
//! # Usage
//!
//! ```ignore
//! use spnr_pnr::place_and_route;
//!
//! let outcome = place_and_route(&mrrg, &design, &config, &sink)?;
//! if let Some(solution) = &outcome.solution {
//!     println!("{}", SolutionReport::new(&mrrg, &design, solution));
//! }
//! ```

#![warn(missing_docs)]

pub mod checker;
pub mod constraints;
pub mod modeler;
pub mod optimizer;
pub mod report;
pub mod session;

pub use checker::{verify, CheckError, RoutedPath, Solution};
pub use constraints::Constraint;
pub use modeler::{declare_variables, Model, Modeler, VarKey};
pub use optimizer::{NodeFilter, Objective, ObjectiveState};
pub use report::{format_timings, ObjectiveReport, RouteReport, SolutionReport};
pub use session::{Feasibility, OptimizeOptions, OptimizeOutcome, PnrSession, Timings};

use spnr_common::{InternalError, SpnrResult};
use spnr_config::PnrConfig;
use spnr_diagnostics::{Diagnostic, DiagnosticSink};
use spnr_ir::Design;
use spnr_mrrg::Mrrg;
use spnr_smt::SatResult;

/// Everything one run of the pipeline produced.
#[derive(Debug, Clone)]
pub struct PnrOutcome {
    /// Pigeonhole verdict.
    pub feasibility: Feasibility,
    /// Verified mapping, if one exists.
    pub solution: Option<Solution>,
    /// Optimizer result, if the optimizer ran.
    pub optimization: Option<OptimizeOutcome>,
    /// Solver calls made.
    pub solver_calls: u32,
    /// Build and solve time.
    pub timings: Timings,
}

impl PnrOutcome {
    /// Returns `true` if a mapping was found.
    pub fn is_sat(&self) -> bool {
        self.solution.is_some()
    }
}

/// Runs attest, solve (or optimize) and verify.
///
/// An infeasible or unsatisfiable design is a normal outcome with no
/// solution. A satisfying model that fails verification is an internal
/// error.
pub fn place_and_route(
    mrrg: &Mrrg,
    design: &Design,
    config: &PnrConfig,
    sink: &DiagnosticSink,
) -> SpnrResult<PnrOutcome> {
    let mut session = PnrSession::new(mrrg, design, sink);
    let feasibility = session.attest();
    let mut optimization = None;
    let model = match feasibility {
        Feasibility::Infeasible { .. } => None,
        Feasibility::Feasible if config.optimize.enabled => {
            let objective = Objective::from(&config.optimize);
            let options = OptimizeOptions::from(&config.optimize);
            let outcome = session.optimize(&objective, &options)?;
            let model = outcome.model.clone();
            optimization = Some(outcome);
            model
        }
        Feasibility::Feasible => {
            session.declare_variables()?;
            session.assert_constraints(&Constraint::ALL)?;
            match session.solve()? {
                SatResult::Sat => Some(session.extract_model()?),
                SatResult::Unsat => None,
            }
        }
    };
    let solution = match model {
        Some(model) => Some(session.verify(&model).map_err(|e| {
            sink.emit(Diagnostic::error(
                session::MODEL_REJECTED,
                format!("solver model is not a legal mapping: {e}"),
            ));
            InternalError::new(format!("solver model failed verification: {e}"))
        })?),
        None => None,
    };
    Ok(PnrOutcome {
        feasibility,
        solution,
        optimization,
        solver_calls: session.solver_calls(),
        timings: session.timings(),
    })
}
