//! Diagnostic severities and the verbosity levels that filter them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a place-and-route diagnostic is.
///
/// Declaration order is severity order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Progress of a run: initial solution, probe results, freezing.
    Note,
    /// The run finished but the answer is weaker than asked for, e.g. the
    /// optimizer stopped before its bounds met.
    Warning,
    /// No mapping can be produced, or a produced mapping is wrong.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Whether a diagnostic of this severity is shown at `verbosity`.
    pub fn is_shown(self, verbosity: Verbosity) -> bool {
        self >= verbosity.threshold()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// How much of a run the user wants to see.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Errors and warnings.
    #[default]
    Normal,
    /// Everything, including per-probe optimizer notes.
    Verbose,
}

impl Verbosity {
    /// Picks a level from `--quiet` / `--verbose`; quiet wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    fn threshold(self) -> Severity {
        match self {
            Verbosity::Quiet => Severity::Error,
            Verbosity::Normal => Severity::Warning,
            Verbosity::Verbose => Severity::Note,
        }
    }
}
