//! Error types for the IMRL libraries

use thiserror::Error;

/// Core error type for option learning and planning
#[derive(Error, Debug)]
pub enum ImrlError {
    /// Feature vectors or matrices of differing dimension were combined
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the receiver works in
        expected: usize,
        /// Dimension that was passed
        actual: usize,
    },

    /// A state that the feature space or environment cannot represent
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An action outside the environment's action set
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Inconsistent configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reference to an option id that does not exist
    #[error("Unknown option: {0}")]
    UnknownOption(usize),

    /// The option stack does not match the experience being credited
    #[error("Option stack error: {0}")]
    OptionStack(String),

    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for IMRL operations
pub type Result<T> = std::result::Result<T, ImrlError>;

/// Fail with [`ImrlError::DimensionMismatch`] unless `actual == expected`.
pub fn ensure_dim(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ImrlError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_reports_both_sides() {
        assert!(ensure_dim(4, 4).is_ok());
        let err = ensure_dim(4, 6).unwrap_err();
        assert!(matches!(
            err,
            ImrlError::DimensionMismatch {
                expected: 4,
                actual: 6
            }
        ));
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4, got 6");
    }
}
