//! Solver errors.

use spnr_common::InternalError;

/// Failures of the solving layer.
#[derive(Debug, thiserror::Error)]
pub enum SmtError {
    /// The SAT engine reported an error.
    #[error("sat engine failure: {0}")]
    Engine(String),

    /// `pop` was called with no open scope.
    #[error("pop without matching push")]
    EmptyScopeStack,

    /// A model value was requested without a preceding satisfiable check.
    #[error("no model available")]
    NoModel,

    /// Two bitvectors of different widths were combined.
    #[error("width mismatch: {left} vs {right}")]
    WidthMismatch {
        /// Width of the left operand.
        left: usize,
        /// Width of the right operand.
        right: usize,
    },

    /// A bit range outside the vector was requested.
    #[error("bit range [{hi}:{lo}] out of bounds for width {width}")]
    OutOfRange {
        /// High bit, inclusive.
        hi: usize,
        /// Low bit, inclusive.
        lo: usize,
        /// Vector width.
        width: usize,
    },
}

impl From<SmtError> for InternalError {
    fn from(err: SmtError) -> Self {
        InternalError::new(err.to_string())
    }
}
