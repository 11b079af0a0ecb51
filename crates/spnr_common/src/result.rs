//! Common result and error types for the spnr backend.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a defect in the encoding,
/// the resource-graph builder or the checker), never a user input problem.
/// User-facing outcomes such as UNSAT or pigeonhole infeasibility are regular
/// `Ok` values.
pub type SpnrResult<T> = Result<T, InternalError>;

/// An internal invariant violation indicating a bug, not a user input problem.
///
/// Examples are double-declared solver variables, lookups of undeclared keys,
/// a tie that references a missing resource node, or two drivers on one input
/// port.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Returns early with an [`InternalError`] built from a format string.
#[macro_export]
macro_rules! internal_bail {
    ($($arg:tt)*) => {
        return Err($crate::InternalError::new(format!($($arg)*)))
    };
}

/// Returns early with an [`InternalError`] unless the condition holds.
#[macro_export]
macro_rules! internal_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::internal_bail!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked_half(v: u32) -> SpnrResult<u32> {
        internal_ensure!(v % 2 == 0, "odd value {v}");
        Ok(v / 2)
    }

    #[test]
    fn display_format() {
        let err = InternalError::new("double declaration");
        assert_eq!(format!("{err}"), "internal error: double declaration");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }

    #[test]
    fn ensure_macro() {
        assert_eq!(checked_half(4).unwrap(), 2);
        let err = checked_half(3).unwrap_err();
        assert_eq!(err.message, "odd value 3");
    }
}
