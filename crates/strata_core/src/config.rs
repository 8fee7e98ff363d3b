//! # Environment Configuration
//!
//! Loaded once at startup, typically from a TOML file.

use serde::Deserialize;

use crate::error::ConfigError;

/// Tuning knobs for an [`crate::Environment`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Keep reported diagnostics for later inspection.
    pub capture_diagnostics: bool,
    /// Maximum number of kept diagnostics.
    pub diagnostic_limit: usize,
    /// Initial capacity of the entity lookup table.
    pub lookup_capacity: usize,
    /// Initial capacity of each tranche.
    pub tranche_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            capture_diagnostics: true,
            diagnostic_limit: 1024,
            lookup_capacity: 1024,
            tranche_capacity: 64,
        }
    }
}

impl EnvironmentConfig {
    /// Configuration for long-running hosts.
    ///
    /// Reports are logged and counted but not kept, so memory stays flat.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            capture_diagnostics: false,
            diagnostic_limit: 0,
            lookup_capacity: 65_536,
            tranche_capacity: 4_096,
        }
    }

    /// Parses a configuration from TOML. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or a value is
    /// out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if capture is enabled with a zero limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_diagnostics && self.diagnostic_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "diagnostic_limit",
                reason: "must be nonzero when capture_diagnostics is enabled",
            });
        }
        Ok(())
    }
}
