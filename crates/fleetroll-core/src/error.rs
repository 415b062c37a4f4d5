//! Error types for fleetroll core.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading or validating rollout configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid rollout plan: {0}")]
    Invalid(String),
}
