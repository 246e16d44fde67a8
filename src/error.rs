//! Configuration errors.
//!
//! Perception misses and resource exhaustion are ordinary outcomes and never
//! show up here. These errors only describe setups the controllers cannot
//! run with; an entity that fails validation is disabled at setup.

use std::fmt;

/// A traversal component was configured in a way it cannot run with.
#[derive(Debug, Clone, PartialEq)]
pub enum TraversalConfigError {
    /// A controller is missing a sibling component it depends on.
    MissingCapability {
        /// The controller that needs the capability.
        controller: &'static str,
        /// The component that provides it.
        requires: &'static str,
    },
    /// A value that must be strictly positive is not.
    NonPositive {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },
    /// The parkour height bands are not in ascending order.
    UnorderedHeightBands {
        /// Name of the lower band.
        lower: &'static str,
        /// Name of the band that is not above it.
        upper: &'static str,
    },
    /// An action's match window is not a sub-range of `[0, 1]`.
    InvalidMatchWindow {
        /// Animator state of the action.
        state: String,
        /// Window start (normalized time).
        start: f32,
        /// Window end (normalized time).
        end: f32,
    },
    /// A wall-run angle range is empty or outside `[0, 180]`.
    InvalidAngleRange {
        /// Lower bound in degrees.
        min: f32,
        /// Upper bound in degrees.
        max: f32,
    },
}

impl fmt::Display for TraversalConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCapability {
                controller,
                requires,
            } => write!(f, "{controller} requires the {requires} component"),
            Self::NonPositive { field, value } => {
                write!(f, "`{field}` must be greater than zero, got {value}")
            }
            Self::UnorderedHeightBands { lower, upper } => {
                write!(f, "`{upper}` must not be lower than `{lower}`")
            }
            Self::InvalidMatchWindow { state, start, end } => write!(
                f,
                "match window [{start}, {end}] of state `{state}` must satisfy 0 <= start <= end <= 1"
            ),
            Self::InvalidAngleRange { min, max } => {
                write!(f, "wall-run angle range ({min}, {max}) is empty or outside [0, 180]")
            }
        }
    }
}

impl std::error::Error for TraversalConfigError {}

/// Fail with [`TraversalConfigError::NonPositive`] unless `value > 0`.
pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), TraversalConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(TraversalConfigError::NonPositive { field, value })
    }
}
