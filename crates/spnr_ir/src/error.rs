//! Front-end errors for program graphs.

/// Problems found while reading or assembling a [`Design`](crate::Design).
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    /// An I/O error occurred while reading the netlist file.
    #[error("failed to read netlist: {0}")]
    IoError(#[from] std::io::Error),

    /// The netlist text is not valid DOT.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// An operation was declared twice.
    #[error("operation '{0}' declared more than once")]
    DuplicateOperation(String),

    /// A node statement lacks the `opcode` attribute.
    #[error("operation '{0}' has no opcode")]
    MissingOpcode(String),

    /// An edge lacks a valid `operand` attribute.
    #[error("edge {src} -> {dst} needs an integer 'operand' attribute")]
    MissingOperand {
        /// Source operation name.
        src: String,
        /// Destination operation name.
        dst: String,
    },

    /// A tie references an undeclared operation.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// Two different values feed the same operand.
    #[error("operand {operand} of '{op}' is driven more than once")]
    OperandBoundTwice {
        /// Destination operation name.
        op: String,
        /// Operand index.
        operand: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_syntax() {
        let err = DesignError::Syntax {
            line: 3,
            message: "expected '}'".to_string(),
        };
        assert_eq!(format!("{err}"), "syntax error on line 3: expected '}'");
    }

    #[test]
    fn display_operand_bound_twice() {
        let err = DesignError::OperandBoundTwice {
            op: "add0".to_string(),
            operand: 1,
        };
        assert_eq!(format!("{err}"), "operand 1 of 'add0' is driven more than once");
    }
}
