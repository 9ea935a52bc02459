//! Error types for motor-unit population models.

use thiserror::Error;

/// Errors that can occur when building or stepping a motor-unit population.
///
/// Configuration errors are fatal: the model cannot be constructed. Input
/// errors are raised by `step` before any state is touched, so a rejected
/// call leaves the model exactly as it was.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MotorUnitError {
    /// Invalid population or model configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A pool and fiber population with different unit counts were paired.
    #[error("motor unit count mismatch: pool has {pool}, fibers have {fibers}")]
    UnitCountMismatch {
        /// Unit count of the motor neuron pool.
        pool: usize,
        /// Unit count of the fiber population.
        fibers: usize,
    },

    /// Step input does not have one value per motor unit.
    #[error("input length mismatch: expected {expected} values, got {actual}")]
    InputLengthMismatch {
        /// Number of motor units in the model.
        expected: usize,
        /// Length of the supplied input.
        actual: usize,
    },

    /// Step input contains `NaN` or an infinity.
    #[error("non-finite input at unit {index}: {value}")]
    NonFiniteInput {
        /// Motor unit index of the offending value.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// A negative firing rate was supplied to a fiber population.
    #[error("negative firing rate at unit {index}: {value}")]
    NegativeFiringRate {
        /// Motor unit index of the offending value.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// Invalid step size.
    #[error("invalid timestep: {0} (must be non-negative and finite)")]
    InvalidTimestep(f64),
}

impl MotorUnitError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an input length mismatch error.
    #[must_use]
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::InputLengthMismatch { expected, actual }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::UnitCountMismatch { .. }
        )
    }

    /// Check if this error rejected a step input.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InputLengthMismatch { .. }
                | Self::NonFiniteInput { .. }
                | Self::NegativeFiringRate { .. }
                | Self::InvalidTimestep(_)
        )
    }
}

/// Result type for motor-unit operations.
pub type Result<T> = std::result::Result<T, MotorUnitError>;

/// Validate a per-unit step input and its timestep.
///
/// Checks the timestep first, then the length, then every value.
pub(crate) fn check_step_input(values: &[f64], expected: usize, dt: f64) -> Result<()> {
    if !dt.is_finite() || dt < 0.0 {
        return Err(MotorUnitError::InvalidTimestep(dt));
    }
    if values.len() != expected {
        return Err(MotorUnitError::length_mismatch(expected, values.len()));
    }
    if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(MotorUnitError::NonFiniteInput { index, value });
    }
    Ok(())
}

/// Validate that a configuration parameter is finite and strictly positive.
pub(crate) fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MotorUnitError::invalid_config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

/// Validate that a configuration parameter is finite and not negative.
pub(crate) fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MotorUnitError::invalid_config(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}
