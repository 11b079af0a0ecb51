//! Input loading and diagnostic output shared by the commands.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;

use spnr_config::{load_config, validate_config, PnrConfig};
use spnr_diagnostics::{DiagnosticRenderer, DiagnosticSink, TerminalRenderer, Verbosity};
use spnr_fabric::{load_fabric, Fabric};
use spnr_ir::{load_dot, Design};

use crate::{GlobalArgs, ReportFormat};

/// Loads `--config` if given, else the defaults.
pub fn resolve_config(global: &GlobalArgs) -> Result<PnrConfig, Box<dyn Error>> {
    match &global.config {
        Some(path) => Ok(load_config(Path::new(path))?),
        None => Ok(PnrConfig::default()),
    }
}

/// Re-validates a config after command-line overrides.
pub fn finish_config(config: PnrConfig) -> Result<PnrConfig, Box<dyn Error>> {
    validate_config(&config)?;
    Ok(config)
}

/// Loads the design and the fabric.
pub fn load_inputs(
    design: &str,
    fabric: &str,
    config: &PnrConfig,
) -> Result<(Design, Fabric), Box<dyn Error>> {
    let duplicates: BTreeSet<String> = config.design.duplicate_opcodes.iter().cloned().collect();
    let design = load_dot(Path::new(design), &duplicates)?;
    let fabric = load_fabric(Path::new(fabric))?;
    Ok((design, fabric))
}

/// Prints the sink's diagnostics to stderr, honoring quiet and verbose.
pub fn render_diagnostics(sink: &DiagnosticSink, global: &GlobalArgs, format: ReportFormat) {
    let verbosity = Verbosity::from_flags(global.quiet, global.verbose);
    let shown: Vec<_> = sink
        .take_all()
        .into_iter()
        .filter(|d| d.severity.is_shown(verbosity))
        .collect();
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &shown {
                eprint!("{}", renderer.render(diag));
            }
        }
        ReportFormat::Json => {
            let renderer = spnr_diagnostics::JsonRenderer;
            for diag in &shown {
                eprintln!("{}", renderer.render(diag));
            }
        }
    }
}
