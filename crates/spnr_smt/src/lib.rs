//! Quantifier-free bitvector solving by bit-blasting onto a CDCL SAT solver.
//!
//! [`Solver`] hands out [`Bool`] and [`Bv`] terms, builds gates over them with
//! Tseitin clauses, and checks satisfiability with `varisat`. Constants are
//! folded at construction and AND/XOR gates are shared, so rebuilding the
//! same formula twice costs no new variables.
//!
//! Assertions can be scoped with [`Solver::push`] / [`Solver::pop`]. Each
//! scope owns an activation literal that guards its assertions; popping a
//! scope permanently disables the literal, so nothing asserted inside the
//! scope outlives it.

#![warn(missing_docs)]

pub mod error;
pub mod solver;
pub mod term;

pub use error::SmtError;
pub use solver::{SatResult, Solver, SolverStats};
pub use term::{Bool, Bv};
