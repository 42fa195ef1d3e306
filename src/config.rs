//! Container configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. Project config: `wiring.toml`
//! 3. Environment variables: `WIRING_*`
//!
//! # Example
//!
//! ```toml
//! # wiring.toml
//! max_arity = 4
//! captive_policy = "reference_only"
//! ```
//!
//! or `WIRING_MAX_ARITY=4 WIRING_CAPTIVE_POLICY=reference_only`.

use std::ops::Deref;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dispatch::MAX_ARITY;
use crate::lifetime::CaptivePolicy;

/// Project config file, relative to the working directory.
pub const CONFIG_FILE: &str = "wiring.toml";

/// Prefix of the environment variables read by [`ContainerConfig::load`].
pub const ENV_PREFIX: &str = "WIRING_";

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl ConfigError {
    /// Unwraps the underlying figment error.
    pub fn into_inner(self) -> figment::Error {
        *self.0
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Settings that govern composition of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Largest constructor arity the dispatcher will consider.
    /// Must not exceed [`MAX_ARITY`].
    pub max_arity: usize,
    /// Which transient dependencies a singleton binding may not hold.
    pub captive_policy: CaptivePolicy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_arity: MAX_ARITY,
            captive_policy: CaptivePolicy::default(),
        }
    }
}

impl ContainerConfig {
    /// Load config with layered resolution (defaults → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered figment used by [`load`](Self::load), for callers that
    /// want to merge their own providers on top.
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 1: Defaults (lowest priority)
            .merge(Serialized::defaults(Self::default()))
            // Layer 2: Project config
            .merge(Toml::file(CONFIG_FILE))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates a config from any figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the dispatcher cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_arity > MAX_ARITY {
            return Err(figment::Error::from(format!(
                "max_arity {} exceeds the supported maximum of {}",
                self.max_arity, MAX_ARITY
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.max_arity, MAX_ARITY);
        assert_eq!(config.captive_policy, CaptivePolicy::Conservative);
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = ContainerConfig::load().map_err(ConfigError::into_inner)?;
            assert_eq!(config, ContainerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                max_arity = 3
                captive_policy = "reference_only"
                "#,
            )?;
            jail.set_env("WIRING_MAX_ARITY", "5");

            let config = ContainerConfig::load().map_err(ConfigError::into_inner)?;
            assert_eq!(config.max_arity, 5);
            assert_eq!(config.captive_policy, CaptivePolicy::ReferenceOnly);
            Ok(())
        });
    }

    #[test]
    fn test_max_arity_above_supported_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("WIRING_MAX_ARITY", "12");
            let err = ContainerConfig::load().unwrap_err();
            assert!(err.to_string().contains("max_arity 12"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("WIRING_CAPTIVE_POLICY", "lenient");
            assert!(ContainerConfig::load().is_err());
            Ok(())
        });
    }
}
