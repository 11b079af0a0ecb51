//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::PnrConfig;
use std::path::Path;

/// Loads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<PnrConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<PnrConfig, ConfigError> {
    let config: PnrConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges that the type system cannot express.
///
/// Also called by the CLI after command-line overrides are applied.
pub fn validate_config(config: &PnrConfig) -> Result<(), ConfigError> {
    if config.mrrg.contexts == 0 {
        return Err(ConfigError::ValidationError(
            "mrrg.contexts must be at least 1".to_string(),
        ));
    }
    let opt = &config.optimize;
    if let Some(cutoff) = opt.cutoff {
        check_fraction("optimize.cutoff", cutoff)?;
    }
    check_fraction("optimize.final_cutoff", opt.final_cutoff)?;
    if let Some(budget) = opt.time_budget_secs {
        if budget.is_nan() || budget <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "optimize.time_budget_secs must be positive, got {budget}"
            )));
        }
    }
    if opt.max_iterations == Some(0) {
        return Err(ConfigError::ValidationError(
            "optimize.max_iterations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must be in [0, 1), got {value}"
        )))
    }
}
