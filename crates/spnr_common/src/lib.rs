//! Shared foundational types used across the spnr place-and-route backend.
//!
//! This crate provides the internal error type and result alias, the opaque
//! ID newtype macro used for arena indices, and the accumulating [`Timer`]
//! used for build/solve profiling.

#![warn(missing_docs)]

pub mod ids;
pub mod result;
pub mod timer;

pub use result::{InternalError, SpnrResult};
pub use timer::Timer;
