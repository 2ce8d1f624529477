//! Error types for eventform-core.

use thiserror::Error;

/// Result type alias for eventform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Only misconfiguration is reported through these. Malformed hits and
/// unroutable clusters are dropped and counted by the component that
/// sees them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A plane id cannot be used for matching.
    #[error("invalid plane id: {0}")]
    InvalidPlane(u8),

    /// The named time/position estimator does not exist.
    #[error("unknown time algorithm: {0:?}")]
    UnknownTimeAlgorithm(String),
}

impl Error {
    /// Shorthand for building an [`Error::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::config("min_cluster_size must be at least 1").to_string(),
            "invalid configuration: min_cluster_size must be at least 1"
        );
        assert_eq!(Error::InvalidPlane(255).to_string(), "invalid plane id: 255");
        assert_eq!(
            Error::UnknownTimeAlgorithm("fastest".into()).to_string(),
            "unknown time algorithm: \"fastest\""
        );
    }
}
