//! Configuration validation

use super::error::ConfigResult;

/// Configuration objects that can check their own invariants
///
/// ```rust,ignore
/// fn build<C: Validatable>(config: C) -> Result<Engine, ConfigError> {
///     config.validate()?;
///     // ...
/// }
/// ```
pub trait Validatable {
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Name used in error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdgConfig;

    fn check<C: Validatable>(config: &C) -> ConfigResult<()> {
        config.validate()
    }

    #[test]
    fn test_generic_validation() {
        let config = PdgConfig::default();
        assert!(check(&config).is_ok());
        assert_eq!(Validatable::config_name(&config), "PdgConfig");
        assert!(check(&config.max_fixpoint_iterations(0)).is_err());
    }
}
