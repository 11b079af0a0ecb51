//! Parsing and validation of `spnr.toml` run configuration files.
//!
//! This crate reads the run configuration and produces a strongly-typed
//! [`PnrConfig`] holding the resource-graph construction policies, the
//! duplicable-opcode set, and the optimizer settings. Every section is
//! optional; an empty file yields [`PnrConfig::default`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config};
pub use types::*;
