//! spnr: the command-line front end of the CGRA place-and-route backend.
//!
//! `spnr place` maps a DOT dataflow graph onto a JSON fabric description,
//! optionally minimizing routing resources. `spnr parse` loads both inputs
//! and prints resource-graph statistics without solving.

#![warn(missing_docs)]

mod inputs;
mod parse;
mod place;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use spnr_common::InternalError;
use spnr_config::{ObjectiveKind, PopcountEncoding};

/// spnr: SMT-based placement and routing for CGRAs.
#[derive(Parser, Debug)]
#[command(name = "spnr", version, about = "SMT place-and-route for CGRAs")]
pub struct Cli {
    /// Suppress everything but errors and the verdict.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also show progress notes.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to an `spnr.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Place and route a design onto a fabric.
    Place(PlaceArgs),
    /// Load a design and a fabric and print statistics.
    Parse(ParseArgs),
}

/// Arguments for `spnr place`.
#[derive(Parser, Debug)]
pub struct PlaceArgs {
    /// Dataflow graph in DOT.
    pub design: String,

    /// Fabric description in JSON.
    pub fabric: String,

    /// Number of contexts.
    #[arg(long)]
    pub contexts: Option<u32>,

    /// Minimize routing resources after the first solution.
    #[arg(long)]
    pub optimize: bool,

    /// Resource class to minimize.
    #[arg(long, value_enum)]
    pub objective: Option<ObjectiveArg>,

    /// Population-count encoding of the objective.
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Probe bounds on one solver with push/pop.
    #[arg(long)]
    pub incremental: bool,

    /// Stop once the relative gap drops to this fraction.
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Pin placement at the first cutoff and keep optimizing routing.
    #[arg(long)]
    pub freeze_placement: bool,

    /// Opcodes whose operations may be duplicated.
    #[arg(long = "duplicate", value_name = "OPCODE")]
    pub duplicate_opcodes: Vec<String>,

    /// Shorthand for `--duplicate const`.
    #[arg(long)]
    pub duplicate_const: bool,

    /// Output format for the result.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Print build and solve times.
    #[arg(long)]
    pub time: bool,
}

/// Arguments for `spnr parse`.
#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Dataflow graph in DOT.
    pub design: String,

    /// Fabric description in JSON.
    pub fabric: String,

    /// Number of contexts.
    #[arg(long)]
    pub contexts: Option<u32>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Resource class to minimize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ObjectiveArg {
    /// Muxes.
    Mux,
    /// Muxes and registers.
    MuxRegister,
    /// Every non-unit node.
    Routing,
}

impl From<ObjectiveArg> for ObjectiveKind {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::Mux => ObjectiveKind::Mux,
            ObjectiveArg::MuxRegister => ObjectiveKind::MuxRegister,
            ObjectiveArg::Routing => ObjectiveKind::Routing,
        }
    }
}

/// Population-count encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    /// Sum of if-then-else terms.
    Ite,
    /// Sum of zero-extended bits.
    ZeroExtend,
    /// Parallel bit counting.
    BitHack,
    /// Threshold network.
    Shannon,
}

impl From<EncodingArg> for PopcountEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Ite => PopcountEncoding::Ite,
            EncodingArg::ZeroExtend => PopcountEncoding::ZeroExtend,
            EncodingArg::BitHack => PopcountEncoding::BitHack,
            EncodingArg::Shannon => PopcountEncoding::Shannon,
        }
    }
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from the environment.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Suppress non-error output.
    pub quiet: bool,
    /// Show progress notes.
    pub verbose: bool,
    /// Use colored output.
    pub color: bool,
    /// Optional path to a config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => {
            std::env::var_os("NO_COLOR").is_none() && std::env::var_os("TERM").is_some()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Place(ref args) => place::run(args, &global),
        Command::Parse(ref args) => parse::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) if e.downcast_ref::<InternalError>().is_some() => {
            eprintln!("{e}");
            process::exit(2);
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_place_defaults() {
        let cli = Cli::parse_from(["spnr", "place", "g.dot", "f.json"]);
        match cli.command {
            Command::Place(ref args) => {
                assert_eq!(args.design, "g.dot");
                assert_eq!(args.fabric, "f.json");
                assert!(args.contexts.is_none());
                assert!(!args.optimize);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Place command"),
        }
    }

    #[test]
    fn parse_place_with_flags() {
        let cli = Cli::parse_from([
            "spnr",
            "place",
            "g.dot",
            "f.json",
            "--contexts",
            "2",
            "--optimize",
            "--objective",
            "mux-register",
            "--encoding",
            "shannon",
            "--cutoff",
            "0.1",
            "--duplicate",
            "const",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Place(ref args) => {
                assert_eq!(args.contexts, Some(2));
                assert!(args.optimize);
                assert_eq!(args.objective, Some(ObjectiveArg::MuxRegister));
                assert_eq!(args.encoding, Some(EncodingArg::Shannon));
                assert_eq!(args.cutoff, Some(0.1));
                assert_eq!(args.duplicate_opcodes, vec!["const"]);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Place command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "spnr", "--quiet", "--color", "never", "parse", "g.dot", "f.json",
        ]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
        assert!(matches!(cli.command, Command::Parse(_)));
    }
}
