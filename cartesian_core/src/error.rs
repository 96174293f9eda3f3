//! Error types for the Cartesian controller

use crate::solver::SolverError;
use std::path::PathBuf;

/// Errors surfaced to the host framework
#[derive(Debug, thiserror::Error)]
pub enum CartesianError {
    #[error("Invalid configuration for '{field}': {reason}")]
    Config { field: &'static str, reason: String },

    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Forward dynamics failure: {0}")]
    Solver(#[from] SolverError),
}

impl CartesianError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate
pub type CartesianResult<T> = Result<T, CartesianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = CartesianError::config("iterations", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'iterations': must be at least 1"
        );
    }

    #[test]
    fn test_solver_error_conversion() {
        let err: CartesianError = SolverError::Unreachable("joint 3 at limit".into()).into();
        assert!(matches!(err, CartesianError::Solver(_)));
        assert!(err.to_string().contains("joint 3 at limit"));
    }
}
