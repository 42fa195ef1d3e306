//! Container error types.

use thiserror::Error;

use crate::lifetime::LifetimeTag;

/// Result type alias for container operations.
pub type DiResult<T> = Result<T, DiError>;

/// Errors raised while composing a container or resolving from it.
#[derive(Error, Debug)]
pub enum DiError {
    // Composition errors
    #[error("Cannot resolve {type_name}: {reason}")]
    Unresolvable {
        type_name: &'static str,
        reason: String,
    },

    #[error("Captive dependency: {consumer_lifetime} {consumer} depends on {dependency_lifetime} {dependency}")]
    CaptiveDependency {
        consumer: &'static str,
        consumer_lifetime: LifetimeTag,
        dependency: &'static str,
        dependency_lifetime: LifetimeTag,
    },

    #[error("No constructor for {type_name} fits within the maximum arity of {max_arity}")]
    ArityExceeded {
        type_name: &'static str,
        max_arity: usize,
    },

    #[error("{type_name} is bound more than once")]
    DuplicateBinding { type_name: &'static str },

    #[error("{type_name} is bound in process scope but no process scope is attached")]
    MissingProcessScope { type_name: &'static str },

    #[error("Process-scoped {consumer} holds a reference to container-scoped {dependency}")]
    ProcessCapture {
        consumer: &'static str,
        dependency: &'static str,
    },

    // Resolution errors
    #[error("Lifetime mismatch for {type_name}: first resolved as {recorded}, now requested as {requested}")]
    LifetimeMismatch {
        type_name: &'static str,
        recorded: LifetimeTag,
        requested: LifetimeTag,
    },

    #[error("{type_name} was requested while it is still being constructed")]
    CircularDependency { type_name: &'static str },

    #[error("Factory for {type_name} failed: {source}")]
    Factory {
        type_name: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Cached instance does not have the type {type_name}")]
    TypeMismatch { type_name: &'static str },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl DiError {
    /// Returns true for errors detected while composing a container.
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            DiError::CaptiveDependency { .. }
                | DiError::ArityExceeded { .. }
                | DiError::DuplicateBinding { .. }
                | DiError::MissingProcessScope { .. }
                | DiError::ProcessCapture { .. }
                | DiError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_mismatch_message() {
        let err = DiError::LifetimeMismatch {
            type_name: "app::Logger",
            recorded: LifetimeTag::Singleton,
            requested: LifetimeTag::Transient,
        };
        assert_eq!(
            err.to_string(),
            "Lifetime mismatch for app::Logger: first resolved as singleton, now requested as transient"
        );
        assert!(!err.is_composition_error());
    }

    #[test]
    fn test_captive_is_composition_error() {
        let err = DiError::CaptiveDependency {
            consumer: "app::Cache",
            consumer_lifetime: LifetimeTag::Singleton,
            dependency: "app::Request",
            dependency_lifetime: LifetimeTag::Transient,
        };
        assert!(err.is_composition_error());
        assert!(err.to_string().contains("singleton app::Cache"));
    }

    #[test]
    fn test_factory_error_keeps_source() {
        let err = DiError::Factory {
            type_name: "app::Db",
            source: "connection refused".into(),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection refused"));
    }
}
