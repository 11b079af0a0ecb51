//! `spnr parse`: load inputs and print resource-graph statistics.

use std::error::Error;

use serde::Serialize;
use spnr_mrrg::{build_mrrg, MrrgOptions, MrrgStats};

use crate::inputs::{finish_config, load_inputs, resolve_config};
use crate::{GlobalArgs, ParseArgs, ReportFormat};

#[derive(Serialize)]
struct ParseSummary {
    operations: usize,
    values: usize,
    mrrg: MrrgStats,
}

/// Runs `spnr parse`.
pub fn run(args: &ParseArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let mut config = resolve_config(global)?;
    if let Some(contexts) = args.contexts {
        config.mrrg.contexts = contexts;
    }
    let config = finish_config(config)?;
    let (design, fabric) = load_inputs(&args.design, &args.fabric, &config)?;
    let mrrg = build_mrrg(&fabric, &MrrgOptions::from(&config.mrrg))?;
    let summary = ParseSummary {
        operations: design.operations().len(),
        values: design.values().len(),
        mrrg: mrrg.stats(),
    };
    match args.format {
        ReportFormat::Text => {
            let s = &summary.mrrg;
            println!("design: {} operations, {} nets", summary.operations, summary.values);
            println!(
                "mrrg: {} contexts, {} units, {} muxes, {} registers, {} operand ports, {} ties, {} edges",
                s.contexts,
                s.functional_units,
                s.muxes,
                s.registers,
                s.operand_ports,
                s.ties,
                s.edges
            );
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(0)
}
