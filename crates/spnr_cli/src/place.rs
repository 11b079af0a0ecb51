//! `spnr place`: attest, solve or optimize, verify, report.

use std::error::Error;

use serde::Serialize;
use spnr_config::PnrConfig;
use spnr_diagnostics::DiagnosticSink;
use spnr_mrrg::{build_mrrg, MrrgOptions};
use spnr_pnr::{format_timings, place_and_route, Feasibility, SolutionReport, Timings};

use crate::inputs::{finish_config, load_inputs, render_diagnostics, resolve_config};
use crate::{GlobalArgs, PlaceArgs, ReportFormat};

/// Machine-readable result of one run.
#[derive(Serialize)]
struct PlaceResult {
    verdict: &'static str,
    feasibility: Feasibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    solution: Option<SolutionReport>,
    solver_calls: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    timings: Option<Timings>,
}

/// Runs `spnr place`.
///
/// Exits with 0 when a mapping was found and 1 otherwise; internal errors
/// propagate to `main`.
pub fn run(args: &PlaceArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let config = finish_config(apply_overrides(resolve_config(global)?, args))?;
    let (design, fabric) = load_inputs(&args.design, &args.fabric, &config)?;
    let mrrg = build_mrrg(&fabric, &MrrgOptions::from(&config.mrrg))?;
    if !global.quiet && args.format == ReportFormat::Text {
        let stats = mrrg.stats();
        eprintln!(
            "   Mapping {} operations onto {} units ({} contexts, {} routing nodes)",
            design.operations().len(),
            stats.functional_units,
            stats.contexts,
            mrrg.routing_nodes().len(),
        );
    }

    let sink = DiagnosticSink::new();
    let outcome = place_and_route(&mrrg, &design, &config, &sink);
    render_diagnostics(&sink, global, args.format);
    let outcome = outcome?;

    let solution = outcome.solution.as_ref().map(|s| {
        let report = SolutionReport::new(&mrrg, &design, s);
        match &outcome.optimization {
            Some(opt) => report.with_objective(opt),
            None => report,
        }
    });
    let verdict = if outcome.is_sat() { "SAT" } else { "UNSAT" };

    match args.format {
        ReportFormat::Text => {
            println!("{verdict}");
            if let Some(report) = &solution {
                if !global.quiet {
                    println!("{report}");
                }
            }
            if args.time {
                eprintln!(
                    "   Time: {} ({} solver calls)",
                    format_timings(&outcome.timings),
                    outcome.solver_calls
                );
            }
        }
        ReportFormat::Json => {
            let result = PlaceResult {
                verdict,
                feasibility: outcome.feasibility.clone(),
                solution,
                solver_calls: outcome.solver_calls,
                timings: args.time.then_some(outcome.timings),
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(if outcome.is_sat() { 0 } else { 1 })
}

/// Applies command-line flags on top of the file configuration.
fn apply_overrides(mut config: PnrConfig, args: &PlaceArgs) -> PnrConfig {
    if let Some(contexts) = args.contexts {
        config.mrrg.contexts = contexts;
    }
    let opt = &mut config.optimize;
    opt.enabled |= args.optimize;
    opt.incremental |= args.incremental;
    opt.freeze_placement |= args.freeze_placement;
    if let Some(objective) = args.objective {
        opt.objective = objective.into();
    }
    if let Some(encoding) = args.encoding {
        opt.encoding = encoding.into();
    }
    if args.cutoff.is_some() {
        opt.cutoff = args.cutoff;
    }
    let duplicates = &mut config.design.duplicate_opcodes;
    let extra = args
        .duplicate_opcodes
        .iter()
        .map(String::as_str)
        .chain(args.duplicate_const.then_some("const"));
    for opcode in extra {
        if !duplicates.iter().any(|d| d == opcode) {
            duplicates.push(opcode.to_string());
        }
    }
    config
}
